// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # OpenTelemetry Integration
//!
//! Trace context travels through message headers: publishers inject the current
//! context, subscribers extract it and open a consumer span per delivery.

use crate::transport::MessageHeaders;
use opentelemetry::{
    global::{self, BoxedSpan, BoxedTracer},
    propagation::{Extractor, Injector},
    trace::{SpanKind, Tracer},
    Context,
};
use std::borrow::Cow;

/// Adapter exposing message headers to the OpenTelemetry propagators.
pub(crate) struct HeaderPropagator<'a> {
    headers: &'a mut MessageHeaders,
}

impl<'a> HeaderPropagator<'a> {
    pub(crate) fn new(headers: &'a mut MessageHeaders) -> Self {
        Self { headers }
    }
}

impl Injector for HeaderPropagator<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.headers.insert(key.to_lowercase(), value);
    }
}

impl Extractor for HeaderPropagator<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(String::as_str).collect()
    }
}

/// Returns the headers carrying the trace context of `ctx`.
pub(crate) fn inject(ctx: &Context) -> MessageHeaders {
    let mut headers = MessageHeaders::new();
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(ctx, &mut HeaderPropagator::new(&mut headers))
    });
    headers
}

/// Creates a consumer span named `name`, parented on the context found in `headers`.
pub(crate) fn new_span(
    headers: &mut MessageHeaders,
    tracer: &BoxedTracer,
    name: &str,
) -> (Context, BoxedSpan) {
    let ctx = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderPropagator::new(headers))
    });

    let span = tracer
        .span_builder(Cow::from(name.to_owned()))
        .with_kind(SpanKind::Consumer)
        .start_with_context(tracer, &ctx);

    (ctx, span)
}
