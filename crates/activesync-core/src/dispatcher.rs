//! Per-request orchestration.
//!
//! ```text
//! parse -> (Autodiscover) -> authenticate -> version ceiling
//!       -> (Options without device) -> device registry -> (Options)
//!       -> provisioning gate -> headers -> handler
//! ```

use std::str::FromStr;
use std::sync::Arc;

use activesync_types::{Command, Device, DeviceError, GlobalStatus, ProtocolError, ServerConfig};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use bytes::{Bytes, BytesMut};
use tracing::Instrument;

use crate::backend::{AuthOutcome, Backend};
use crate::context::RequestContext;
use crate::error::{AppError, AppResult};
use crate::headers::ResponseHeaderBuilder;
use crate::provisioning::{self, GateDecision, PROVISIONING_REQUIRED_BODY, PROVISIONING_REQUIRED_STATUS};
use crate::registry::DeviceRegistry;
use crate::request::{Credentials, QueryParams, RequestHeaders};
use crate::router::{CommandRouter, HandlerOutcome};
use crate::version::VersionResolver;
use crate::wbxml::read_wbxml_header;
use crate::LIBRARY_VERSION;

/// Transport-neutral view of an inbound request.
#[derive(Debug, Clone)]
pub struct ActiveSyncRequest {
    pub method: Method,
    pub headers: HeaderMap,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct ActiveSyncResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Global status the handler saw, if any
    pub global_error: Option<GlobalStatus>,
}

impl ActiveSyncResponse {
    fn empty(status: StatusCode, headers: HeaderMap) -> Self {
        Self { status, headers, body: Bytes::new(), global_error: None }
    }
}

pub struct Dispatcher {
    config: Arc<ServerConfig>,
    backend: Arc<dyn Backend>,
    registry: DeviceRegistry,
    router: CommandRouter,
}

impl Dispatcher {
    pub fn new(
        config: Arc<ServerConfig>,
        backend: Arc<dyn Backend>,
        registry: DeviceRegistry,
        router: CommandRouter,
    ) -> Self {
        Self { config, backend, registry, router }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Serve one request. Failures become protocol-appropriate responses.
    pub async fn handle(&self, request: ActiveSyncRequest) -> ActiveSyncResponse {
        let mut ctx = match self.context_for(&request) {
            Ok(ctx) => ctx,
            Err(e) => {
                let versions = VersionResolver::new(self.config.max_version);
                return self.error_response(&e, &versions, "-");
            },
        };

        let span = tracing::info_span!(
            "activesync",
            request_id = %ctx.request_id,
            command = ctx.query.cmd.as_deref().unwrap_or("Options"),
            device_id = ctx.device_id().unwrap_or("-"),
            user = tracing::field::Empty,
            global_status = tracing::field::Empty,
        );

        match self.run(&mut ctx, request).instrument(span.clone()).await {
            Ok(response) => {
                if let Some(status) = response.global_error {
                    span.record("global_status", status.code());
                    span.in_scope(|| {
                        tracing::info!(
                            "[{}] Answered with global status {}",
                            ctx.request_id,
                            status
                        );
                    });
                }
                response
            },
            Err(e) => self.error_response(&e, &ctx.versions, &ctx.request_id),
        }
    }

    fn context_for(&self, request: &ActiveSyncRequest) -> AppResult<RequestContext> {
        let headers = RequestHeaders::from_headers(&request.headers)?;
        let query = QueryParams::parse(request.query.as_deref())?;
        Ok(RequestContext::new(headers, query, self.config.max_version))
    }

    async fn run(
        &self,
        ctx: &mut RequestContext,
        request: ActiveSyncRequest,
    ) -> AppResult<ActiveSyncResponse> {
        // GET is answered like OPTIONS.
        let cmd_name = if request.method == Method::OPTIONS || request.method == Method::GET {
            Command::Options.as_str().to_string()
        } else {
            ctx.query.cmd.clone().ok_or(ProtocolError::MissingCommand)?
        };
        tracing::debug!("[{}] {} {}", ctx.request_id, request.method, cmd_name);

        // Autodiscover authenticates on its own.
        if cmd_name.eq_ignore_ascii_case(Command::Autodiscover.as_str()) {
            ctx.command = Some(Command::Autodiscover);
            return self.run_handler(ctx, Command::Autodiscover, &request.body, None).await;
        }

        let version = ctx.protocol_version()?;
        self.authenticate(ctx, &request.headers).await?;

        let user = ctx.user.clone().unwrap_or_default();
        tracing::Span::current().record("user", user.as_str());

        if let Some(ceiling) = self
            .backend
            .version_callback(&user, ctx.device_id().unwrap_or_default())
            .await?
        {
            if ctx.versions.lower_ceiling(ceiling) {
                tracing::debug!("[{}] Protocol ceiling for {} is {}", ctx.request_id, user, ceiling);
            }
        }

        let is_options = cmd_name.eq_ignore_ascii_case(Command::Options.as_str());
        if ctx.device_id().is_none() {
            if is_options {
                return self.options_response(ctx);
            }
            return Err(ProtocolError::MissingDeviceId.into());
        }

        let command = Command::from_str(&cmd_name)?;
        ctx.command = Some(command);
        tracing::info!(
            "[{}] {} from {} for {} (EAS {})",
            ctx.request_id,
            command,
            ctx.device_id().unwrap_or_default(),
            user,
            version
        );

        let device = self.registry.create_or_load(ctx, self.backend.as_ref()).await?;

        if command == Command::Options {
            return self.options_response(ctx);
        }

        ctx.provisioning = self.backend.provisioning(&device).await?;
        let decision =
            provisioning::check(ctx.provisioning, command, &device, ctx.presented_policy_key());
        if decision == GateDecision::ProvisioningRequired {
            tracing::info!(
                "[{}] Policy key mismatch for {} ({} mode), requesting provisioning",
                ctx.request_id,
                device.id,
                ctx.provisioning
            );
            return self.provisioning_required_response(ctx);
        }

        ctx.wbxml = read_wbxml_header(&request.body)?;

        let response = self.run_handler(ctx, command, &request.body, Some(&device)).await?;

        // Handlers such as Provision update the device through the context.
        if let Some(updated) = ctx.device.as_mut() {
            if *updated != device {
                self.registry.save(updated).await?;
            }
        }
        Ok(response)
    }

    async fn authenticate(&self, ctx: &mut RequestContext, headers: &HeaderMap) -> AppResult<()> {
        let creds = Credentials::extract(headers, &ctx.query)
            .ok_or_else(|| AppError::Authentication("no credentials supplied".to_string()))?;
        let (domain, login) = Credentials::split_domain(&creds.username);
        let username = self.backend.username_from_email(login);

        let outcome = self.backend.authenticate(&username, &creds.password, domain).await?;
        match outcome {
            AuthOutcome::Accepted => {},
            AuthOutcome::Rejected => {
                tracing::warn!("[{}] Authentication failed for {}", ctx.request_id, username);
                return Err(AppError::Authentication(format!("invalid credentials for {}", username)));
            },
            denied => {
                let graceful = ctx.negotiated_version().is_some_and(|v| v.supports_global_status());
                match denied.global_status() {
                    Some(status) if graceful => {
                        tracing::info!(
                            "[{}] {} denied by policy, reporting status {}",
                            ctx.request_id,
                            username,
                            status
                        );
                        ctx.set_global_error(status);
                    },
                    _ => {
                        return Err(DeviceError::Denied {
                            id: ctx.device_id().unwrap_or_default().to_string(),
                            user: username,
                        }
                        .into());
                    },
                }
            },
        }

        ctx.domain = domain.map(str::to_string);
        ctx.user = Some(username);
        Ok(())
    }

    async fn run_handler(
        &self,
        ctx: &mut RequestContext,
        command: Command,
        body: &[u8],
        device: Option<&Device>,
    ) -> AppResult<ActiveSyncResponse> {
        let handler = self.router.route(command)?;

        let mut headers = self.header_builder(&ctx.versions).options_headers()?;
        if ctx.announce_upgrade {
            self.header_builder(&ctx.versions).upgrade_header(&mut headers)?;
        }
        if command != Command::GetAttachment && command != Command::Autodiscover {
            ResponseHeaderBuilder::content_type(&mut headers, ctx.multipart());
        }

        let mut out = BytesMut::new();
        let outcome = handler.handle(ctx, body, &mut out).await?;
        match outcome {
            HandlerOutcome::Completed(true) => {},
            HandlerOutcome::Completed(false) => {
                return Err(AppError::Backend(format!(
                    "{} failed for {}",
                    command,
                    device.map_or("-", |d| d.id.as_str())
                )));
            },
            HandlerOutcome::ContentType(content_type) => {
                ResponseHeaderBuilder::override_content_type(&mut headers, &content_type)?;
            },
        }

        Ok(ActiveSyncResponse {
            status: StatusCode::OK,
            headers,
            body: out.freeze(),
            global_error: ctx.global_error,
        })
    }

    fn header_builder<'a>(&'a self, versions: &'a VersionResolver) -> ResponseHeaderBuilder<'a> {
        ResponseHeaderBuilder::new(&self.config.product_name, LIBRARY_VERSION, versions)
    }

    fn options_response(&self, ctx: &RequestContext) -> AppResult<ActiveSyncResponse> {
        let headers = self.header_builder(&ctx.versions).options_headers()?;
        Ok(ActiveSyncResponse::empty(StatusCode::OK, headers))
    }

    fn provisioning_required_response(
        &self,
        ctx: &RequestContext,
    ) -> AppResult<ActiveSyncResponse> {
        let headers = self.header_builder(&ctx.versions).provisioning_required_headers()?;
        let status = StatusCode::from_u16(PROVISIONING_REQUIRED_STATUS)
            .map_err(|e| AppError::Backend(e.to_string()))?;
        Ok(ActiveSyncResponse {
            status,
            headers,
            body: Bytes::from_static(PROVISIONING_REQUIRED_BODY.as_bytes()),
            global_error: ctx.global_error,
        })
    }

    fn error_response(
        &self,
        err: &AppError,
        versions: &VersionResolver,
        request_id: &str,
    ) -> ActiveSyncResponse {
        let builder = self.header_builder(versions);
        let (status, headers) = match err {
            AppError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                builder.unauthorized_headers(&self.config.realm).unwrap_or_default(),
            ),
            AppError::Protocol(ProtocolError::NotImplemented { .. }) => {
                (StatusCode::NOT_IMPLEMENTED, HeaderMap::new())
            },
            AppError::Protocol(_) => (StatusCode::BAD_REQUEST, HeaderMap::new()),
            AppError::Device(e) if e.is_policy_denial() => (StatusCode::FORBIDDEN, HeaderMap::new()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new()),
        };

        if err.is_client_error() {
            tracing::warn!("[{}] {} -> {}", request_id, err, status.as_u16());
        } else {
            tracing::error!("[{}] {}", request_id, err);
        }

        let mut response = ActiveSyncResponse::empty(status, headers);
        response.headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        response.body = Bytes::from(err.to_string());
        response
    }
}
