//! Type-state markers for the builder pattern
//!
//! These types track which required parts have been supplied, so
//! `build()` only exists once the client has credentials and a sink.

use std::marker::PhantomData;

/// Marker trait for provider state
pub trait ProviderState {}

/// No credentials source yet
pub struct NoProvider;
impl ProviderState for NoProvider {}

/// Credentials or a provider have been set
pub struct HasProvider;
impl ProviderState for HasProvider {}

/// Marker trait for sink state
pub trait SinkState {}

/// No event sink yet
pub struct NoSink;
impl SinkState for NoSink {}

/// Event sink has been set
pub struct HasSink;
impl SinkState for HasSink {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<P, S> {
    _provider: PhantomData<P>,
    _sink: PhantomData<S>,
}

impl<P, S> TypeState<P, S> {
    pub(crate) fn new() -> Self {
        Self {
            _provider: PhantomData,
            _sink: PhantomData,
        }
    }
}

impl<P, S> Default for TypeState<P, S> {
    fn default() -> Self {
        Self::new()
    }
}
