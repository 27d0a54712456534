//! The per-request pipeline of a resolved route.
//!
//! Strictly sequential:
//!
//! 1. parse the raw request against the effective contract,
//! 2. validate the route's own declared fields,
//! 3. build the [`Context`],
//! 4. for each middleware in order: validate its fields, run it, stop on a
//!    response, otherwise merge its record,
//! 5. wrap the context with the merged record,
//! 6. run the handler.
//!
//! Every failure becomes a response at the step that detected it; no later
//! step runs.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Map;
use tracing::debug;

use crate::context::{Context, ExtendedContext, RequestFields};
use crate::error::{ErrorPolicy, PipelineError, panic_message};
use crate::middleware::Outcome;
use crate::parse::{self, Parsed};
use crate::request::Request;
use crate::response::Response;
use crate::router::InternalRoute;
use crate::schema::{self, Field, RequestSchema};

impl InternalRoute {
    pub(crate) async fn run(&self, req: Request, errors: &ErrorPolicy) -> Response {
        let parsed = match parse::parse(&req, &self.request) {
            Ok(parsed) => parsed,
            Err(err) => return errors.respond(&err),
        };

        let fields = match validate_fields(&self.own_request, &parsed).await {
            Ok(fields) => fields,
            Err(err) => return errors.respond(&err),
        };

        let ctx = Context::new(fields, Arc::new(req), Arc::clone(&self.responses), errors.clone());

        let mut data = Map::new();
        for middleware in &self.middleware {
            let scoped = match middleware.request_schema() {
                Some(contract) => match validate_fields(contract, &parsed).await {
                    Ok(fields) => ctx.scoped(fields),
                    Err(err) => {
                        debug!(middleware = middleware.name(), "middleware input rejected");
                        return errors.respond(&err);
                    }
                },
                None => ctx.scoped(RequestFields::default()),
            };

            let outcome = AssertUnwindSafe(middleware.execute(scoped)).catch_unwind().await;
            match outcome {
                Ok(Ok(Outcome::Respond(res))) => {
                    debug!(middleware = middleware.name(), status = res.status(), "middleware responded");
                    return res;
                }
                Ok(Ok(Outcome::Extend(record))) => data.extend(record),
                Ok(Err(e)) => {
                    let err = PipelineError::internal(format!("middleware `{}` failed: {e}", middleware.name()));
                    return errors.respond(&err);
                }
                Err(panic) => {
                    let err = PipelineError::internal(format!(
                        "middleware `{}` panicked: {}",
                        middleware.name(),
                        panic_message(panic.as_ref()),
                    ));
                    return errors.respond(&err);
                }
            }
        }

        let ctx = ExtendedContext::new(ctx, data);
        match AssertUnwindSafe(self.handler.call(ctx)).catch_unwind().await {
            Ok(Ok(res)) if res.has_valid_status() => res,
            Ok(Ok(res)) => {
                let err = PipelineError::internal(format!("handler returned invalid status {}", res.status()));
                errors.respond(&err)
            }
            Ok(Err(e)) => errors.respond(&PipelineError::internal(format!("handler failed: {e}"))),
            Err(panic) => {
                let err = PipelineError::internal(format!("handler panicked: {}", panic_message(panic.as_ref())));
                errors.respond(&err)
            }
        }
    }
}

/// Validates every field `contract` declares; undeclared fields stay empty.
async fn validate_fields(contract: &RequestSchema, parsed: &Parsed) -> Result<RequestFields, PipelineError> {
    let mut fields = RequestFields::default();
    for field in Field::REQUEST {
        if let Some(schema) = contract.get(field) {
            let value = schema::validate(Some(&**schema), parsed.field(field))
                .await
                .map_err(|e| e.at(field))?;
            fields.set(field, value);
        }
    }
    Ok(fields)
}
