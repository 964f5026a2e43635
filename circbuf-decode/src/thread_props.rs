// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Name, stack size and scheduling class of the decode thread.
//!
//! Hardware decoders are usually fed from a real-time thread so that a busy
//! pipeline does not starve the codec. Raising the scheduling class needs
//! privileges (`CAP_SYS_NICE` on Linux); without them the thread keeps running
//! with the inherited policy and a warning is logged.

use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Default name of the decode thread.
pub const DEFAULT_THREAD_NAME: &str = "circbuf-decode";

/// Real-time priorities accepted for [`Scheduling::Fifo`] and
/// [`Scheduling::RoundRobin`].
pub const PRIORITY_RANGE: std::ops::RangeInclusive<i32> = 1..=99;

/// Scheduling policy applied to the decode thread once it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum Scheduling {
    /// Keep the policy of the spawning thread.
    #[default]
    Inherit,
    /// `SCHED_FIFO` with the given priority.
    Fifo { priority: i32 },
    /// `SCHED_RR` with the given priority.
    RoundRobin { priority: i32 },
}

/// Decode thread properties.
///
/// ```
/// use circbuf_decode::{Scheduling, ThreadProperties};
///
/// let props: ThreadProperties = serde_json::from_str(
///     r#"{"name": "aac-decode", "scheduling": {"policy": "fifo", "priority": 50}}"#,
/// ).unwrap();
/// assert_eq!(props.scheduling, Scheduling::Fifo { priority: 50 });
/// assert_eq!(props.stack_size, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ThreadProperties {
    pub name: String,
    pub stack_size: Option<usize>,
    pub scheduling: Scheduling,
}

impl Default for ThreadProperties {
    fn default() -> Self {
        Self {
            name: DEFAULT_THREAD_NAME.to_owned(),
            stack_size: None,
            scheduling: Scheduling::Inherit,
        }
    }
}

impl ThreadProperties {
    /// Checks the scheduling priority and stack size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a priority outside
    /// [`PRIORITY_RANGE`] or a zero stack size.
    pub fn validate(&self) -> Result<()> {
        if let Scheduling::Fifo { priority } | Scheduling::RoundRobin { priority } =
            self.scheduling
            && !PRIORITY_RANGE.contains(&priority)
        {
            return Err(Error::InvalidConfig(format!(
                "real-time priority {priority} outside {PRIORITY_RANGE:?}"
            )));
        }
        if self.stack_size == Some(0) {
            return Err(Error::InvalidConfig("stack size must be non-zero".into()));
        }
        Ok(())
    }

    pub(crate) fn builder(&self) -> thread::Builder {
        let builder = thread::Builder::new().name(self.name.clone());
        match self.stack_size {
            Some(size) => builder.stack_size(size),
            None => builder,
        }
    }

    /// Applies the scheduling policy to the calling thread.
    ///
    /// Failure is logged and otherwise ignored.
    pub(crate) fn apply_scheduling(&self) {
        let result = match self.scheduling {
            Scheduling::Inherit => return,
            Scheduling::Fifo { priority } => set_realtime(Policy::Fifo, priority),
            Scheduling::RoundRobin { priority } => set_realtime(Policy::RoundRobin, priority),
        };
        match result {
            Ok(()) => debug!(thread = %self.name, scheduling = ?self.scheduling, "Scheduling applied"),
            Err(e) => warn!(
                thread = %self.name,
                scheduling = ?self.scheduling,
                error = %e,
                "Could not apply real-time scheduling, keeping inherited policy"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Policy {
    Fifo,
    RoundRobin,
}

#[cfg(target_os = "linux")]
fn set_realtime(policy: Policy, priority: i32) -> std::io::Result<()> {
    let policy = match policy {
        Policy::Fifo => libc::SCHED_FIFO,
        Policy::RoundRobin => libc::SCHED_RR,
    };
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY
    // pthread_self() is always a valid handle for the calling thread and
    // `param` outlives the call.
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), policy, &param) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::from_raw_os_error(rc))
    }
}

#[cfg(not(target_os = "linux"))]
fn set_realtime(_policy: Policy, _priority: i32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "real-time scheduling is only supported on Linux",
    ))
}
