//! Request telemetry middleware: tags every response with an `X-Request-ID` for correlated
//! logging and records the per-route Prometheus counters. It can be placed on any route or
//! service; placed on the whole app it sees every request.
use std::{future::Future, pin::Pin, rc::Rc, time::Instant};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error,
};
use futures_util::future::{ok, Ready};
use uuid::Uuid;

use crate::metrics::{HTTP_REQUESTS, HTTP_REQUEST_DURATION};

pub struct RequestTelemetryFactory;

impl<S, B> Transform<S, ServiceRequest> for RequestTelemetryFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestTelemetryService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequestTelemetryService { service: Rc::new(service) })
    }
}

pub struct RequestTelemetryService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestTelemetryService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let method = req.method().to_string();
        Box::pin(async move {
            let mut res = service.call(req).await?;
            // The matched route pattern keeps the label cardinality bounded; unmatched requests
            // fall back to the raw path.
            let path = res.request().match_pattern().unwrap_or_else(|| res.request().path().to_string());
            let status = res.status().as_u16().to_string();
            HTTP_REQUESTS.with_label_values(&[&method, &path, &status]).inc();
            HTTP_REQUEST_DURATION.with_label_values(&[&method, &path]).observe(started.elapsed().as_secs_f64());
            if let Ok(value) = HeaderValue::try_from(request_id.to_string()) {
                res.headers_mut().insert(HeaderName::from_static("x-request-id"), value);
            }
            Ok(res)
        })
    }
}
