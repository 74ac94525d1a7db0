use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Employee, EmployeeId, EmployeeInput, Team, TeamId},
    error::{ApiError, ErrorCode},
    protocol::{field_errors_detail, ApiResponse, EmployeeRequest, Reply, TeamRequest},
};
use tracing::debug;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
const SUMMARY_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub type GatewayResult<T> = Result<Reply<T>, ApiError>;

/// Persistence operations the roster depends on. Implementations own the
/// transport; callers only see typed replies and [`ApiError`]s.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn list_teams(&self) -> GatewayResult<Vec<Team>>;
    async fn create_team(&self, name: &str) -> GatewayResult<Team>;
    async fn rename_team(&self, id: TeamId, name: &str) -> GatewayResult<Team>;
    async fn delete_team(&self, id: TeamId) -> GatewayResult<()>;
    async fn list_employees(&self) -> GatewayResult<Vec<Employee>>;
    async fn create_employee(&self, employee: &EmployeeInput) -> GatewayResult<Employee>;
    async fn update_employee(&self, employee: &Employee) -> GatewayResult<Employee>;
    async fn delete_employee(&self, id: EmployeeId) -> GatewayResult<()>;
    /// Spreadsheet summary of every team and employee.
    async fn download_summary(&self) -> Result<Vec<u8>, ApiError>;
}

pub struct HttpGateway {
    http: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, None)
    }

    /// `timeout` of `None` leaves requests unbounded.
    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|err| {
            ApiError::new(ErrorCode::Internal, "failed to build HTTP client")
                .with_detail(err.to_string())
        })?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url).map_err(|err| {
            ApiError::new(ErrorCode::Internal, format!("invalid API base URL '{base_url}'"))
                .with_detail(err.to_string())
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::new(
                ErrorCode::Internal,
                format!("unsupported API URL scheme '{}'", parsed.scheme()),
            ));
        }
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>, ApiError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }

        let envelope: ApiResponse<T> = serde_json::from_slice(&body).map_err(|err| {
            ApiError::new(
                ErrorCode::MalformedResponse,
                "The team service sent a response that could not be read.",
            )
            .with_detail(err.to_string())
        })?;

        if !envelope.success {
            return Err(envelope.into_error(ErrorCode::Server));
        }
        Ok(envelope)
    }

    async fn send_for_data<T: DeserializeOwned>(&self, request: RequestBuilder) -> GatewayResult<T> {
        let envelope = self.send::<T>(request).await?;
        match envelope.data {
            Some(data) => Ok(Reply {
                data,
                message: envelope.message,
            }),
            None => Err(ApiError::new(
                ErrorCode::MalformedResponse,
                "The team service reported success but returned no record.",
            )),
        }
    }

    async fn send_for_ack(&self, request: RequestBuilder) -> GatewayResult<()> {
        let envelope = self.send::<serde_json::Value>(request).await?;
        Ok(Reply {
            data: (),
            message: envelope.message,
        })
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list_teams(&self) -> GatewayResult<Vec<Team>> {
        debug!("gateway: GET /teams");
        self.send_for_data(self.http.get(self.endpoint("/teams"))).await
    }

    async fn create_team(&self, name: &str) -> GatewayResult<Team> {
        debug!(team_name = name, "gateway: POST /teams");
        let request = self.http.post(self.endpoint("/teams")).json(&TeamRequest {
            name: name.to_string(),
        });
        self.send_for_data(request).await
    }

    async fn rename_team(&self, id: TeamId, name: &str) -> GatewayResult<Team> {
        debug!(team_id = id.0, team_name = name, "gateway: PATCH /teams/{{id}}");
        let request = self
            .http
            .patch(self.endpoint(&format!("/teams/{id}")))
            .json(&TeamRequest {
                name: name.to_string(),
            });
        self.send_for_data(request).await
    }

    async fn delete_team(&self, id: TeamId) -> GatewayResult<()> {
        debug!(team_id = id.0, "gateway: DELETE /teams/{{id}}");
        self.send_for_ack(self.http.delete(self.endpoint(&format!("/teams/{id}"))))
            .await
    }

    async fn list_employees(&self) -> GatewayResult<Vec<Employee>> {
        debug!("gateway: GET /employees");
        self.send_for_data(self.http.get(self.endpoint("/employees")))
            .await
    }

    async fn create_employee(&self, employee: &EmployeeInput) -> GatewayResult<Employee> {
        debug!(team_id = employee.team_id.0, "gateway: POST /employees");
        let request = self
            .http
            .post(self.endpoint("/employees"))
            .json::<EmployeeRequest>(employee);
        self.send_for_data(request).await
    }

    async fn update_employee(&self, employee: &Employee) -> GatewayResult<Employee> {
        debug!(employee_id = employee.id.0, "gateway: PATCH /employees/{{id}}");
        let body: EmployeeRequest = employee.to_input();
        let request = self
            .http
            .patch(self.endpoint(&format!("/employees/{}", employee.id)))
            .json(&body);
        self.send_for_data(request).await
    }

    async fn delete_employee(&self, id: EmployeeId) -> GatewayResult<()> {
        debug!(employee_id = id.0, "gateway: DELETE /employees/{{id}}");
        self.send_for_ack(
            self.http
                .delete(self.endpoint(&format!("/employees/{id}"))),
        )
        .await
    }

    async fn download_summary(&self) -> Result<Vec<u8>, ApiError> {
        debug!("gateway: GET /summary/download");
        let response = self
            .http
            .get(self.endpoint("/summary/download"))
            .header(ACCEPT, SUMMARY_CONTENT_TYPE)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }
        Ok(body.to_vec())
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    let message = if err.is_timeout() {
        "The team service did not answer in time."
    } else {
        "Could not reach the team service."
    };
    ApiError::new(ErrorCode::Transport, message).with_detail(err.to_string())
}

/// Best-effort decoding of a failed response: the API envelope first, then the
/// bean-validation field map, then the raw body as detail.
fn error_from_body(status: StatusCode, body: &[u8]) -> ApiError {
    let code = ErrorCode::from_status(status.as_u16());

    if let Ok(envelope) = serde_json::from_slice::<ApiResponse<serde_json::Value>>(body) {
        if envelope.message.is_some() || envelope.error.is_some() {
            return envelope.into_error(code);
        }
    }

    if let Ok(fields) = serde_json::from_slice::<BTreeMap<String, String>>(body) {
        if let Some(detail) = field_errors_detail(&fields) {
            return ApiError::new(ErrorCode::Validation, "The server rejected the submitted data.")
                .with_detail(detail);
        }
    }

    let text = String::from_utf8_lossy(body);
    ApiError::generic(code).with_detail(format!("HTTP {}: {}", status.as_u16(), text.trim()))
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
