/// Numeric identifier of an object member (method, signal or property).
///
/// Identifiers partition the member space of a single object; methods,
/// signals and properties share it.
#[derive(
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    serde::Serialize,
    serde::Deserialize,
    derive_more::Display,
    derive_more::From,
    derive_more::Into,
)]
#[serde(transparent)]
pub struct ActionId(pub u32);

impl ActionId {
    /// Returns the current id and advances to the next one, wrapping on
    /// overflow.
    pub fn wrapping_next(&mut self) -> Self {
        let old_id = self.0;
        self.0 = self.0.wrapping_add(1);
        Self(old_id)
    }
}
