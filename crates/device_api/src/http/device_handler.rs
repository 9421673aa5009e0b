use crate::domain::{
    CreateDeviceRequest, DeleteDeviceRequest, DeviceService, GetDeviceRequest,
    ListDevicesRequest, UpdateDeviceRequest,
};
use crate::http::dto::{DeviceBody, DeviceResponse};
use crate::http::error::ApiError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use common::domain::DeviceState;
use garde::Validate;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Routes of the device API
pub fn device_routes(service: Arc<DeviceService>) -> Router {
    Router::new()
        .route("/devices", get(list_devices).post(create_device))
        .route(
            "/devices/{id}",
            get(get_device).put(update_device).delete(delete_device),
        )
        .with_state(service)
}

async fn list_devices(
    State(service): State<Arc<DeviceService>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Vec<DeviceResponse>>, ApiError> {
    let Query(params) =
        query.map_err(|e| ApiError::bad_request(format!("invalid query string: {}", e)))?;
    let request = parse_list_params(params)?;

    let devices = service.list_devices(request).await?;
    Ok(Json(devices.into_iter().map(DeviceResponse::from).collect()))
}

async fn get_device(
    State(service): State<Arc<DeviceService>>,
    Path(id): Path<String>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let device_id = parse_device_id(&id)?;

    let device = service.get_device(GetDeviceRequest { device_id }).await?;
    Ok(Json(device.into()))
}

async fn create_device(
    State(service): State<Arc<DeviceService>>,
    body: Result<Json<DeviceBody>, JsonRejection>,
) -> Result<(StatusCode, Json<DeviceResponse>), ApiError> {
    let (name, brand, state) = parse_body(body)?;

    let device = service
        .create_device(CreateDeviceRequest { name, brand, state })
        .await?;
    Ok((StatusCode::CREATED, Json(device.into())))
}

async fn update_device(
    State(service): State<Arc<DeviceService>>,
    Path(id): Path<String>,
    body: Result<Json<DeviceBody>, JsonRejection>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let device_id = parse_device_id(&id)?;
    let (name, brand, state) = parse_body(body)?;

    let device = service
        .update_device(UpdateDeviceRequest {
            device_id,
            name,
            brand,
            state,
        })
        .await?;
    Ok(Json(device.into()))
}

async fn delete_device(
    State(service): State<Arc<DeviceService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let device_id = parse_device_id(&id)?;

    service
        .delete_device(DeleteDeviceRequest { device_id })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_device_id(id: &str) -> Result<Uuid, ApiError> {
    if id.is_empty() {
        return Err(ApiError::bad_request("you must inform the device id"));
    }
    Uuid::parse_str(id)
        .map_err(|_| ApiError::bad_request("invalid device id format, must be an uuid"))
}

fn parse_body(
    body: Result<Json<DeviceBody>, JsonRejection>,
) -> Result<(String, String, DeviceState), ApiError> {
    let Json(body) = body.map_err(|e| {
        debug!(error = %e, "Rejected request body");
        ApiError::bad_request("you must inform all required parameters")
    })?;

    body.validate()
        .map_err(|report| ApiError::bad_request(format!("validation error: {}", report)))?;

    let state = body
        .state
        .parse::<DeviceState>()
        .map_err(|e| ApiError::bad_request(format!("validation error: {}", e)))?;

    Ok((body.name, body.brand, state))
}

/// Only `brand` and `state` are accepted. An empty `state` means no filter,
/// an empty `brand` is an error.
fn parse_list_params(params: Vec<(String, String)>) -> Result<ListDevicesRequest, ApiError> {
    let mut request = ListDevicesRequest::default();

    for (key, value) in params {
        match key.as_str() {
            "brand" => {
                if value.is_empty() {
                    return Err(ApiError::bad_request("invalid brand filter"));
                }
                request.brand = Some(value);
            }
            "state" => {
                if value.is_empty() {
                    continue;
                }
                let state = value.parse::<DeviceState>().map_err(|_| {
                    ApiError::bad_request(
                        "invalid state filter, must be one of: available, in-use, inactive",
                    )
                })?;
                request.state = Some(state);
            }
            other => {
                return Err(ApiError::bad_request(format!(
                    "invalid parameter: {}",
                    other
                )))
            }
        }
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use common::domain::{
        CreateDeviceRepoInput, Device, DeviceRepository, DomainError, InMemoryDeviceRepository,
        MockDeviceRepository,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(match body {
                Some(b) => Body::from(b.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn seeded_router(devices: &[(&str, &str, DeviceState)]) -> (Router, Vec<Device>) {
        let repo = InMemoryDeviceRepository::new();
        let mut seeded = Vec::new();
        for (name, brand, state) in devices {
            seeded.push(
                repo.create_device(CreateDeviceRepoInput {
                    device_id: Uuid::new_v4(),
                    name: name.to_string(),
                    brand: brand.to_string(),
                    state: *state,
                })
                .await
                .unwrap(),
            );
        }
        let router = device_routes(Arc::new(DeviceService::new(Arc::new(repo))));
        (router, seeded)
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (router, _) = seeded_router(&[]).await;

        let (status, created) = send(
            &router,
            "POST",
            "/devices",
            Some(json!({"name": "iPhone 15", "brand": "Apple", "state": "available"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["state"], "available");
        assert!(created["updated_at"].is_null());

        let id = created["id"].as_str().unwrap();
        let (status, fetched) = send(&router, "GET", &format!("/devices/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_with_missing_field_is_bad_request() {
        let (router, _) = seeded_router(&[]).await;

        let (status, body) = send(
            &router,
            "POST",
            "/devices",
            Some(json!({"name": "iPhone 15", "brand": "Apple"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "you must inform all required parameters");
    }

    #[tokio::test]
    async fn test_create_with_unknown_state_is_bad_request() {
        let (router, _) = seeded_router(&[]).await;

        let (status, body) = send(
            &router,
            "POST",
            "/devices",
            Some(json!({"name": "iPhone 15", "brand": "Apple", "state": "broken"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("validation error"));
    }

    #[tokio::test]
    async fn test_get_with_malformed_id_is_bad_request() {
        let (router, _) = seeded_router(&[]).await;

        let (status, body) = send(&router, "GET", "/devices/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid device id format, must be an uuid");
    }

    #[tokio::test]
    async fn test_get_unknown_device_is_not_found() {
        let (router, _) = seeded_router(&[]).await;

        let (status, body) =
            send(&router, "GET", &format!("/devices/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "device not found");
    }

    #[tokio::test]
    async fn test_list_filters_and_ordering() {
        let (router, _) = seeded_router(&[
            ("iPhone 15", "Apple", DeviceState::Available),
            ("Galaxy S23 FE", "Samsung", DeviceState::InUse),
            ("AirPods", "Apple", DeviceState::InUse),
        ])
        .await;

        let (status, all) = send(&router, "GET", "/devices", None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = all
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["AirPods", "Galaxy S23 FE", "iPhone 15"]);

        let (_, apple_in_use) =
            send(&router, "GET", "/devices?brand=Apple&state=in-use", None).await;
        assert_eq!(apple_in_use.as_array().unwrap().len(), 1);
        assert_eq!(apple_in_use[0]["name"], "AirPods");

        let (status, none) = send(&router, "GET", "/devices?brand=Nokia", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(none, json!([]));

        let (_, empty_state) = send(&router, "GET", "/devices?state=", None).await;
        assert_eq!(empty_state.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_rejects_bad_query() {
        let (router, _) = seeded_router(&[]).await;

        let (status, body) = send(&router, "GET", "/devices?color=red", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid parameter: color");

        let (status, body) = send(&router, "GET", "/devices?brand=", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid brand filter");

        let (status, body) = send(&router, "GET", "/devices?state=retired", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "invalid state filter, must be one of: available, in-use, inactive"
        );
    }

    #[tokio::test]
    async fn test_update_in_use_device() {
        let (router, seeded) =
            seeded_router(&[("Galaxy S23 FE", "Samsung", DeviceState::InUse)]).await;
        let uri = format!("/devices/{}", seeded[0].device_id);

        let (status, body) = send(
            &router,
            "PUT",
            &uri,
            Some(json!({"name": "Galaxy S24", "brand": "Samsung", "state": "in-use"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "device is in use and cannot be updated");

        let (status, body) = send(
            &router,
            "PUT",
            &uri,
            Some(json!({"name": "Galaxy S24", "brand": "Samsung", "state": "available"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Galaxy S23 FE");
        assert_eq!(body["state"], "available");
        assert!(!body["updated_at"].is_null());
    }

    #[tokio::test]
    async fn test_update_unknown_device_is_not_found() {
        let (router, _) = seeded_router(&[]).await;

        let (status, _) = send(
            &router,
            "PUT",
            &format!("/devices/{}", Uuid::new_v4()),
            Some(json!({"name": "Pixel 8", "brand": "Google", "state": "available"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_device() {
        let (router, seeded) = seeded_router(&[
            ("iPhone 15", "Apple", DeviceState::Available),
            ("AirPods", "Apple", DeviceState::InUse),
        ])
        .await;

        let uri = format!("/devices/{}", seeded[0].device_id);
        let (status, body) = send(&router, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());

        let (status, _) = send(&router, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let in_use = format!("/devices/{}", seeded[1].device_id);
        let (status, body) = send(&router, "DELETE", &in_use, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "device is in use and cannot be deleted");
    }

    #[tokio::test]
    async fn test_internal_error_hides_cause() {
        let mut mock_repo = MockDeviceRepository::new();
        mock_repo.expect_list_devices().times(1).return_once(|_| {
            Err(DomainError::RepositoryError(anyhow::anyhow!(
                "password authentication failed for user postgres"
            )))
        });
        let router = device_routes(Arc::new(DeviceService::new(Arc::new(mock_repo))));

        let (status, body) = send(&router, "GET", "/devices", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["error"].as_str().unwrap().contains("password"));
    }
}
