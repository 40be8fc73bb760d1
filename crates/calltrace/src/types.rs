//! The trace tree.
//!
//! A [`Trace`] records one traced call: who was called, when it started and
//! finished, what it noted along the way, and the traces of the calls it
//! made. Status and duration are derived from that tree.
//!
//! A tree is built by a single call stack. It can be moved to another thread
//! once built, but nothing here synchronizes concurrent mutation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::clock::{Clock, millis_between, system_clock};
use crate::config::TraceConfig;
use crate::error::{Result, TraceError};
use crate::message::{self, Arg};

/// Outcome of a traced call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Error,
    #[default]
    Ok,
    ValidationError,
    Warn,
    AccessDenied,
    Skip,
}

impl Status {
    /// All statuses, in declaration order.
    pub const ALL: [Status; 6] = [
        Status::Error,
        Status::Ok,
        Status::ValidationError,
        Status::Warn,
        Status::AccessDenied,
        Status::Skip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Error => "ERROR",
            Status::Ok => "OK",
            Status::ValidationError => "VALIDATION_ERROR",
            Status::Warn => "WARN",
            Status::AccessDenied => "ACCESS_DENIED",
            Status::Skip => "SKIP",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = TraceError;

    /// Case-insensitive; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| TraceError::InvalidArgument(format!("unknown status '{}'", s)))
    }
}

/// One traced call and the calls it made.
///
/// `status` is the status set on this node. The effective status, which
/// also reflects the children, is [`Trace::status()`].
#[derive(Debug, Clone, Deserialize)]
#[serde(remote = "Self", rename_all = "camelCase", default)]
pub struct Trace {
    /// Component that was called, often a type name.
    pub class_name: String,

    /// Operation that was called.
    pub method: String,

    /// Status explicitly set on this node.
    ///
    /// Serialized output carries the effective status. When read back, a
    /// status that the children already account for is not kept here.
    pub status: Status,

    /// When the trace was created.
    pub start_time: DateTime<Utc>,

    /// When the trace was last finished.
    pub end_time: Option<DateTime<Utc>>,

    /// Milliseconds from `start_time` to `end_time`.
    pub duration: Option<u64>,

    /// Child traces in call order.
    pub items: Vec<Trace>,

    /// Free-form annotations.
    pub messages: Vec<String>,

    /// Lap records, `"<elapsed>:<lap> <message>"`.
    pub times: Vec<String>,

    /// Named parameters of the call.
    pub parameters: BTreeMap<String, String>,

    /// Whether lap records are kept. Inherited by children.
    pub log_time: bool,

    /// Watermark for the next lap; `None` means `start_time`.
    last_time: Option<DateTime<Utc>>,

    #[serde(skip, default = "system_clock")]
    clock: Arc<dyn Clock>,
}

impl Default for Trace {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

impl Trace {
    /// Start a trace on the system clock with lap timing off.
    pub fn new(class_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self::with_clock(class_name, method, system_clock())
    }

    /// Start a trace that reads time from `clock`.
    pub fn with_clock(
        class_name: impl Into<String>,
        method: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let start_time = clock.now();
        Self {
            class_name: class_name.into(),
            method: method.into(),
            status: Status::Ok,
            start_time,
            end_time: None,
            duration: None,
            items: Vec::new(),
            messages: Vec::new(),
            times: Vec::new(),
            parameters: BTreeMap::new(),
            log_time: false,
            last_time: None,
            clock,
        }
    }

    /// Start a trace with settings from `config`.
    pub fn with_config(
        class_name: impl Into<String>,
        method: impl Into<String>,
        config: &TraceConfig,
    ) -> Self {
        let mut trace = Self::new(class_name, method);
        trace.log_time = config.log_time;
        trace
    }

    /// Start a trace named after the type `T`.
    pub fn for_type<T: ?Sized>(method: impl Into<String>) -> Self {
        Self::new(std::any::type_name::<T>(), method)
    }

    /// Start a trace named after the type of `object`.
    ///
    /// The name is the static type of the reference, so a trait object is
    /// reported as `dyn Trait`.
    pub fn of<T: ?Sized>(object: &T, method: impl Into<String>) -> Self {
        Self::new(std::any::type_name_of_val(object), method)
    }

    /// Like [`Trace::of`], for callers holding an optional object.
    ///
    /// An absent object is a caller bug and yields
    /// [`TraceError::InvalidArgument`].
    pub fn try_of<T: ?Sized>(object: Option<&T>, method: impl Into<String>) -> Result<Self> {
        let method = method.into();
        match object {
            Some(object) => Ok(Self::of(object, method)),
            None => Err(TraceError::InvalidArgument(format!(
                "cannot derive a class name for '{}' from an absent object",
                method
            ))),
        }
    }

    /// Configure a trace before starting it.
    pub fn builder(class_name: impl Into<String>, method: impl Into<String>) -> TraceBuilder {
        TraceBuilder::new(class_name, method)
    }

    /// Start a child trace, append it to `items` and return it.
    ///
    /// The child shares this trace's clock and copies its `log_time`. The
    /// caller is responsible for finishing it.
    pub fn create_child(
        &mut self,
        class_name: impl Into<String>,
        method: impl Into<String>,
    ) -> &mut Trace {
        let mut child = Trace::with_clock(class_name, method, Arc::clone(&self.clock));
        child.log_time = self.log_time;
        self.items.push(child);
        let last = self.items.len() - 1;
        &mut self.items[last]
    }

    /// Start a child trace named after the type `T`.
    pub fn create_child_for<T: ?Sized>(&mut self, method: impl Into<String>) -> &mut Trace {
        self.create_child(std::any::type_name::<T>(), method)
    }

    /// Start a child trace named after the type of `object`.
    pub fn create_child_of<T: ?Sized>(
        &mut self,
        object: &T,
        method: impl Into<String>,
    ) -> &mut Trace {
        self.create_child(std::any::type_name_of_val(object), method)
    }

    /// Append an already built trace as a child.
    pub fn add_item(&mut self, trace: Trace) {
        self.items.push(trace);
    }

    /// Append a message verbatim.
    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Append a message built from a template.
    ///
    /// An absent template records [`NULL_MESSAGE`](crate::NULL_MESSAGE).
    /// With no arguments the template is recorded verbatim.
    pub fn add_message_with(&mut self, template: Option<&str>, args: &[Arg<'_>]) {
        self.messages.push(message::render(template, args));
    }

    /// Record a lap, if lap timing is on.
    ///
    /// The record reads `"<elapsed>:<lap> <message>"`: milliseconds since
    /// the trace started, and since the previous lap (or the start).
    pub fn log_time(&mut self, message: impl Into<String>) {
        if self.log_time {
            self.push_lap(message.into());
        }
    }

    /// Record a lap with a message built from a template.
    pub fn log_time_with(&mut self, template: Option<&str>, args: &[Arg<'_>]) {
        if self.log_time {
            self.push_lap(message::render(template, args));
        }
    }

    fn push_lap(&mut self, message: String) {
        let mark = self.lap_mark();
        // Laps never run backwards, even if the clock does.
        let now = self.clock.now().max(mark);
        let lap = millis_between(mark, now);
        let elapsed = millis_between(self.start_time, now);
        self.last_time = Some(now);
        self.times.push(format!("{}:{} {}", elapsed, lap, message));
    }

    fn lap_mark(&self) -> DateTime<Utc> {
        self.last_time.unwrap_or(self.start_time)
    }

    /// Set a parameter, replacing any previous value for `name`.
    pub fn parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Set this node's own status.
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Stamp the end time and compute the duration in milliseconds.
    ///
    /// Calling it again moves the end time to the later call.
    pub fn finish(&mut self) -> u64 {
        let end = self.clock.now().max(self.start_time);
        let duration = millis_between(self.start_time, end);
        self.end_time = Some(end);
        self.duration = Some(duration);

        tracing::debug!(
            class_name = %self.class_name,
            method = %self.method,
            duration_ms = duration,
            "Trace finished"
        );
        duration
    }

    /// Duration in milliseconds, finishing the trace first if needed.
    pub fn duration(&mut self) -> u64 {
        match (self.end_time, self.duration) {
            (Some(_), Some(duration)) => duration,
            (Some(end), None) => {
                let duration = millis_between(self.start_time, end);
                self.duration = Some(duration);
                duration
            }
            (None, _) => self.finish(),
        }
    }

    /// Duration of a finished trace, without finishing it.
    pub fn elapsed(&self) -> Option<u64> {
        self.end_time.and(self.duration)
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Effective status of this call.
    ///
    /// A status set on this node wins. Otherwise the first child, in call
    /// order, whose own effective status is not OK decides. The first match
    /// wins, not the most severe one. Computed fresh on every call.
    pub fn status(&self) -> Status {
        if !self.status.is_ok() {
            return self.status;
        }
        self.items
            .iter()
            .map(Trace::status)
            .find(|status| !status.is_ok())
            .unwrap_or(Status::Ok)
    }

    pub fn has_error(&self) -> bool {
        self.status() == Status::Error
    }

    pub fn has_warning(&self) -> bool {
        self.status() == Status::Warn
    }
}

impl Serialize for Trace {
    /// Writes the effective status, and omits `endTime` and `duration`
    /// until the trace is finished.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Trace", 12)?;
        state.serialize_field("className", &self.class_name)?;
        state.serialize_field("method", &self.method)?;
        state.serialize_field("status", &self.status())?;
        state.serialize_field("startTime", &self.start_time)?;
        match &self.end_time {
            Some(end) => state.serialize_field("endTime", end)?,
            None => state.skip_field("endTime")?,
        }
        state.serialize_field("lastTime", &self.lap_mark())?;
        match self.elapsed() {
            Some(duration) => state.serialize_field("duration", &duration)?,
            None => state.skip_field("duration")?,
        }
        state.serialize_field("items", &self.items)?;
        state.serialize_field("messages", &self.messages)?;
        state.serialize_field("times", &self.times)?;
        state.serialize_field("parameters", &self.parameters)?;
        state.serialize_field("logTime", &self.log_time)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Trace {
    /// Reads the serialized shape back. The written status is the effective
    /// one, so it is kept as this node's own status only when the first
    /// non-OK child would not already produce it.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut trace = Trace::deserialize(deserializer)?;
        if !trace.status.is_ok() {
            let from_children = trace
                .items
                .iter()
                .map(Trace::status)
                .find(|status| !status.is_ok());
            if from_children == Some(trace.status) {
                trace.status = Status::Ok;
            }
        }
        Ok(trace)
    }
}

/// Builder for a root [`Trace`].
#[derive(Debug)]
pub struct TraceBuilder {
    class_name: String,
    method: String,
    status: Status,
    log_time: bool,
    clock: Option<Arc<dyn Clock>>,
}

impl TraceBuilder {
    pub fn new(class_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method: method.into(),
            status: Status::Ok,
            log_time: false,
            clock: None,
        }
    }

    pub fn log_time(mut self, enabled: bool) -> Self {
        self.log_time = enabled;
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Read time from `clock` instead of the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Apply settings from a config.
    pub fn config(mut self, config: &TraceConfig) -> Self {
        self.log_time = config.log_time;
        self
    }

    /// Start the trace. The start time is taken now, not when the builder
    /// was created.
    pub fn build(self) -> Trace {
        let clock = self.clock.unwrap_or_else(system_clock);
        let mut trace = Trace::with_clock(self.class_name, self.method, clock);
        trace.status = self.status;
        trace.log_time = self.log_time;
        trace
    }
}
