//! Signal-backed typed cells.

use crate::{error::PropertyError, signal::Signal};
use parking_lot::Mutex;
use quark_value::{AnyValue, Signature, Type};
use std::sync::Arc;

/// A typed value cell whose writes also trigger an embedded signal.
///
/// The signal is owned by the property and carries the property's value type
/// as its parameter signature. Subscribers cannot distinguish a property
/// update from a plain signal emission on the same id.
pub struct Property {
    value_type: Option<Type>,
    value: Mutex<AnyValue>,
    signal: Arc<Signal>,
}

impl Property {
    pub fn new(value_type: Option<Type>) -> Self {
        let signature = Signature::new(value_type.clone());
        Self {
            value_type,
            value: Mutex::new(AnyValue::Unit),
            signal: Arc::new(Signal::new(signature)),
        }
    }

    pub fn value_type(&self) -> Option<&Type> {
        self.value_type.as_ref()
    }

    pub fn value(&self) -> AnyValue {
        self.value.lock().clone()
    }

    /// Stores a new value and triggers the embedded signal with it.
    ///
    /// The write is visible to readers before any subscriber runs. The value
    /// must conform to the declared type.
    pub fn set_value(&self, value: AnyValue) -> Result<(), PropertyError> {
        if !value.conforms_to(self.value_type.as_ref()) {
            return Err(PropertyError::TypeMismatch {
                expected: Signature::new(self.value_type.clone()).to_string(),
                actual: value.ty().to_string(),
            });
        }
        *self.value.lock() = value.clone();
        self.signal.trigger(&[value]);
        Ok(())
    }

    pub fn signal(&self) -> &Arc<Signal> {
        &self.signal
    }
}

impl std::fmt::Debug for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("value_type", &self.value_type)
            .field("value", &*self.value.lock())
            .finish()
    }
}
