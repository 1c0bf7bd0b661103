//! HTTP handler functions for the tool boundary.

use actix_web::{HttpResponse, web};
use sfd_feed::FeedError;
use sfd_tools_models::{ToolName, tool_definitions};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "healthy": true,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /tools`
///
/// Returns the JSON Schema catalog of available tools.
pub async fn tool_catalog() -> HttpResponse {
    HttpResponse::Ok().json(tool_definitions())
}

/// `POST /tools/{name}`
///
/// Invokes a tool by name. The JSON body carries the tool's arguments; an
/// empty or absent body means defaults.
pub async fn call_tool(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<serde_json::Value>>,
) -> HttpResponse {
    let name = path.into_inner();
    let Ok(tool) = serde_json::from_value::<ToolName>(serde_json::Value::String(name.clone()))
    else {
        return HttpResponse::NotFound().json(error_body("UNKNOWN_TOOL", &format!(
            "no tool named '{name}'"
        )));
    };

    let arguments = body.map_or(serde_json::Value::Null, web::Json::into_inner);

    match state.tools.execute(tool, arguments).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => {
            log::error!("tool {tool} failed: {e}");
            error_response(&e)
        }
    }
}

/// Maps a feed error onto an HTTP response with a stable error code.
fn error_response(e: &FeedError) -> HttpResponse {
    let body = error_body(e.code(), &e.to_string());
    match e {
        FeedError::UpstreamTimeout => HttpResponse::GatewayTimeout().json(body),
        FeedError::NoData => HttpResponse::NotFound().json(body),
        FeedError::UpstreamHttp { .. }
        | FeedError::UpstreamNetwork(_)
        | FeedError::SchemaValidation { .. } => HttpResponse::BadGateway().json(body),
    }
}

fn error_body(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "code": code,
            "message": message,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_errors_map_to_gateway_statuses() {
        let cases = [
            (FeedError::UpstreamHttp { status: 500 }, 502),
            (FeedError::UpstreamTimeout, 504),
            (
                FeedError::SchemaValidation {
                    path: "data[0].id".to_string(),
                },
                502,
            ),
            (FeedError::NoData, 404),
        ];
        for (error, status) in cases {
            assert_eq!(error_response(&error).status().as_u16(), status);
        }
    }

    #[test]
    fn tool_names_resolve_from_url_segments() {
        let tool: ToolName =
            serde_json::from_value(serde_json::Value::String("is_fire_active".to_string()))
                .unwrap();
        assert_eq!(tool, ToolName::IsFireActive);

        assert!(
            serde_json::from_value::<ToolName>(serde_json::Value::String("nope".to_string()))
                .is_err()
        );
    }
}
