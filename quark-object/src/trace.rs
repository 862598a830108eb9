//! Per-call observability records.

use quark_value::{ActionId, AnyValue};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TraceKind {
    Call,
    Result,
    Error,
}

impl TraceKind {
    fn code(self) -> i32 {
        match self {
            TraceKind::Call => 1,
            TraceKind::Result => 2,
            TraceKind::Error => 3,
        }
    }
}

/// One event of a traced call: the invocation itself, or its outcome.
///
/// A call and its outcome share the same trace id, allocated by the context
/// the call was made with.
#[derive(Clone, PartialEq, Debug)]
pub struct EventTrace {
    pub id: u32,
    pub kind: TraceKind,
    pub action: ActionId,
    pub arguments: AnyValue,
    pub timestamp: SystemTime,
    pub user_usecs: i64,
    pub system_usecs: i64,
}

impl EventTrace {
    pub fn call(id: u32, action: ActionId, arguments: AnyValue) -> Self {
        Self {
            id,
            kind: TraceKind::Call,
            action,
            arguments,
            timestamp: SystemTime::now(),
            user_usecs: 0,
            system_usecs: 0,
        }
    }

    pub fn outcome(
        id: u32,
        kind: TraceKind,
        action: ActionId,
        arguments: AnyValue,
        user_usecs: i64,
        system_usecs: i64,
    ) -> Self {
        Self {
            id,
            kind,
            action,
            arguments,
            timestamp: SystemTime::now(),
            user_usecs,
            system_usecs,
        }
    }

    /// The value representation under which the trace travels on the
    /// `traceObject` signal.
    pub fn to_value(&self) -> AnyValue {
        let timestamp_usecs = self
            .timestamp
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_micros() as i64)
            .unwrap_or(0);
        AnyValue::Tuple(vec![
            self.id.into(),
            self.kind.code().into(),
            self.action.0.into(),
            self.arguments.clone(),
            timestamp_usecs.into(),
            self.user_usecs.into(),
            self.system_usecs.into(),
        ])
    }
}

/// Min/max/cumulated aggregate of one measured quantity, in seconds.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct ValueStatistics {
    pub min: f32,
    pub max: f32,
    pub cumulated: f32,
}

impl ValueStatistics {
    fn push(&mut self, value: f32, first: bool) {
        if first {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.cumulated += value;
    }

    fn to_value(self) -> AnyValue {
        AnyValue::Tuple(vec![
            self.cumulated.into(),
            self.min.into(),
            self.max.into(),
        ])
    }
}

/// Accumulated timing samples of one method.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct MethodStatistics {
    pub count: u32,
    pub wall: ValueStatistics,
    pub user: ValueStatistics,
    pub system: ValueStatistics,
}

impl MethodStatistics {
    pub fn push(&mut self, wall: f32, user: f32, system: f32) {
        let first = self.count == 0;
        self.wall.push(wall, first);
        self.user.push(user, first);
        self.system.push(system, first);
        self.count += 1;
    }

    pub fn to_value(&self) -> AnyValue {
        AnyValue::Tuple(vec![
            self.count.into(),
            self.wall.to_value(),
            self.user.to_value(),
            self.system.to_value(),
        ])
    }
}
