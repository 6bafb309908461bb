//! ASN filter middleware.
//! Classifies the client IP and admits or rejects the request.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::net::IpAddr;

use crate::asn::AsnRecord;
use crate::config::EnforcementMode;
use crate::http::request::request_id;
use crate::security::{FilterHandle, Verdict};

/// Context attached to requests whose client IP was classified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientAsn {
    pub ip: IpAddr,
    pub record: AsnRecord,
    /// Set when policy denied the ASN but the filter only observes.
    pub denied: bool,
}

/// Wrap every route of `router` with the ASN filter.
pub fn protect<S>(router: Router<S>, filter: FilterHandle) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(filter, asn_filter_middleware))
}

pub async fn asn_filter_middleware(
    State(filter): State<FilterHandle>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let (verdict, enforcement, name) = {
        let filter = filter.load();
        (
            filter.check_headers(req.headers()),
            filter.enforcement(),
            filter.name().to_string(),
        )
    };

    match verdict {
        Verdict::Skipped | Verdict::Allowed(None) => {}
        Verdict::Allowed(Some(c)) => {
            req.extensions_mut().insert(ClientAsn {
                ip: c.ip,
                record: c.record,
                denied: false,
            });
        }
        Verdict::Denied(c) => match enforcement {
            EnforcementMode::Enforce => {
                tracing::info!(
                    filter = %name,
                    request_id = %request_id(req.headers()),
                    ip = %c.ip,
                    asn = c.record.asn,
                    "Request rejected"
                );
                return StatusCode::FORBIDDEN.into_response();
            }
            EnforcementMode::Observe => {
                req.extensions_mut().insert(ClientAsn {
                    ip: c.ip,
                    record: c.record,
                    denied: true,
                });
            }
        },
    }

    next.run(req).await
}
