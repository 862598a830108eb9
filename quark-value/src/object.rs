//! Metadata records describing the members of an object.

use crate::{ids::ActionId, map::Map, signature::Signature, ty::Type};

/// The interface snapshot of an object: its methods, signals and properties,
/// keyed by member id.
#[derive(Clone, Default, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct MetaObject {
    pub methods: Map<ActionId, MetaMethod>,
    pub signals: Map<ActionId, MetaSignal>,
    pub properties: Map<ActionId, MetaProperty>,
    pub description: String,
}

impl MetaObject {
    pub fn builder() -> MetaObjectBuilder {
        MetaObjectBuilder::new()
    }

    pub fn method(&self, id: ActionId) -> Option<&MetaMethod> {
        self.methods.get(&id)
    }

    pub fn signal(&self, id: ActionId) -> Option<&MetaSignal> {
        self.signals.get(&id)
    }

    pub fn property(&self, id: ActionId) -> Option<&MetaProperty> {
        self.properties.get(&id)
    }

    /// Merges two interfaces into one whose id space is the union of both.
    /// On id collision the member of `b` wins.
    pub fn merge(a: &MetaObject, b: &MetaObject) -> MetaObject {
        let mut merged = a.clone();
        merged
            .methods
            .extend(b.methods.iter().map(|(id, m)| (*id, m.clone())));
        merged
            .signals
            .extend(b.signals.iter().map(|(id, s)| (*id, s.clone())));
        merged
            .properties
            .extend(b.properties.iter().map(|(id, p)| (*id, p.clone())));
        if !b.description.is_empty() {
            merged.description = b.description.clone();
        }
        merged
    }
}

#[derive(Default, Debug)]
pub struct MetaObjectBuilder {
    meta_object: MetaObject,
}

impl MetaObjectBuilder {
    pub fn new() -> Self {
        Self {
            meta_object: Default::default(),
        }
    }

    pub fn add_method(&mut self, method: MetaMethod) -> &mut Self {
        self.meta_object.methods.insert(method.uid, method);
        self
    }

    pub fn add_signal(&mut self, signal: MetaSignal) -> &mut Self {
        self.meta_object.signals.insert(signal.uid, signal);
        self
    }

    pub fn add_property(&mut self, property: MetaProperty) -> &mut Self {
        let uid = property.uid;
        self.meta_object.properties.insert(uid, property.clone());
        // Properties are also signals
        self.meta_object.signals.insert(
            uid,
            MetaSignal {
                uid,
                name: property.name,
                signature: property.signature,
            },
        );
        self
    }

    pub fn set_description<T: Into<String>>(&mut self, description: T) -> &mut Self {
        self.meta_object.description = description.into();
        self
    }

    pub fn build(self) -> MetaObject {
        self.meta_object
    }
}

#[derive(Clone, Default, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaMethod {
    pub uid: ActionId,
    pub name: String,
    pub parameters_signature: Signature,
    pub return_signature: Signature,
    pub description: String,
}

impl MetaMethod {
    pub fn builder<T: Into<ActionId>>(uid: T) -> MetaMethodBuilder {
        MetaMethodBuilder {
            uid: uid.into(),
            name: Default::default(),
            description: Default::default(),
            return_value: Default::default(),
            parameters: Default::default(),
        }
    }
}

#[derive(Debug)]
pub struct MetaMethodBuilder {
    uid: ActionId,
    name: String,
    description: String,
    return_value: MetaMethodBuilderReturnValue,
    parameters: Vec<MetaMethodBuilderParameter>,
}

impl MetaMethodBuilder {
    pub fn uid(&self) -> ActionId {
        self.uid
    }

    pub fn set_name<T: Into<String>>(&mut self, name: T) -> &mut Self {
        self.name = name.into();
        self
    }

    pub fn set_description<T: Into<String>>(&mut self, description: T) -> &mut Self {
        self.description = description.into();
        self
    }

    pub fn return_value(&mut self) -> &mut MetaMethodBuilderReturnValue {
        &mut self.return_value
    }

    pub fn parameter(&mut self, index: usize) -> &mut MetaMethodBuilderParameter {
        if self.parameters.len() <= index {
            self.parameters.resize_with(index + 1, Default::default);
        }
        &mut self.parameters[index]
    }

    pub fn build(self) -> MetaMethod {
        let parameter_types = self
            .parameters
            .into_iter()
            .map(|parameter| parameter.ty)
            .collect();
        MetaMethod {
            uid: self.uid,
            name: self.name,
            parameters_signature: Signature::new(Some(Type::Tuple(parameter_types))),
            return_signature: self.return_value.signature,
            description: self.description,
        }
    }
}

#[derive(Default, Debug)]
pub struct MetaMethodBuilderReturnValue {
    signature: Signature,
}

impl MetaMethodBuilderReturnValue {
    pub fn set_type<T: Into<Option<Type>>>(&mut self, ty: T) -> &mut Self {
        self.set_signature(Signature::new(ty.into()))
    }

    pub fn set_signature<T: Into<Signature>>(&mut self, signature: T) -> &mut Self {
        self.signature = signature.into();
        self
    }
}

#[derive(Default, Debug)]
pub struct MetaMethodBuilderParameter {
    ty: Option<Type>,
}

impl MetaMethodBuilderParameter {
    pub fn set_type<T: Into<Option<Type>>>(&mut self, ty: T) -> &mut Self {
        self.ty = ty.into();
        self
    }
}

#[derive(Clone, Default, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct MetaSignal {
    pub uid: ActionId,
    pub name: String,
    pub signature: Signature,
}

#[derive(Clone, Default, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct MetaProperty {
    pub uid: ActionId,
    pub name: String,
    pub signature: Signature,
}
