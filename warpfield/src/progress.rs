/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines progress reporting messages, sinks, and helper functions for long-running processes.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Progress reporting primitives for field generation.

use std::fmt::Debug;
use std::sync::{Arc, mpsc};
use std::thread;
use warpfield_utils::KernelType;

/// Progress events emitted while generating a deformation field.
#[derive(Debug, Clone)]
pub enum ProgressMsg {
    /// A landmark file was read.
    LandmarksLoaded {
        num_points: usize,
        dimensions: usize,
        as_indices: bool,
    },

    /// The kernel transform was fitted.
    TransformFitted {
        kernel_type: KernelType,
        num_landmarks: usize,
        max_residual: f64,
    },

    /// Fraction of grid scan lines evaluated, in `[0, 1]`.
    FieldProgress { progress: f64 },

    /// Arbitrary informational message.
    Message { message: String },
}

/// Sink that consumes progress messages.
pub trait ProgressSink: Send + Sync + Debug {
    fn emit(&self, msg: ProgressMsg);
}

/// Progress sink that forwards messages over a channel.
#[derive(Debug)]
pub struct ClosureSink {
    tx: mpsc::SyncSender<ProgressMsg>,
}

impl ProgressSink for ClosureSink {
    #[inline]
    fn emit(&self, msg: ProgressMsg) {
        let _ = self.tx.try_send(msg);
    }
}

/// Spawns a listener thread that runs a handler closure for each progress message.
///
/// The thread exits once every clone of the returned sink has been dropped.
pub fn closure_sink<F>(
    buffer: usize,
    mut handler: F,
) -> (Arc<dyn ProgressSink>, thread::JoinHandle<()>)
where
    F: FnMut(ProgressMsg) + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel::<ProgressMsg>(buffer.max(1));
    let sink: Arc<dyn ProgressSink> = Arc::new(ClosureSink { tx });

    let handle = thread::spawn(move || {
        while let Ok(msg) = rx.recv() {
            handler(msg);
        }
    });

    (sink, handle)
}

/// Emits `msg` when a sink is installed.
#[inline]
pub(crate) fn report(progress: &Option<Arc<dyn ProgressSink>>, msg: ProgressMsg) {
    if let Some(sink) = progress {
        sink.emit(msg);
    }
}

/// Emits a [`ProgressMsg::Message`] when a sink is installed.
#[inline]
pub(crate) fn report_message(progress: &Option<Arc<dyn ProgressSink>>, message: impl Into<String>) {
    if let Some(sink) = progress {
        sink.emit(ProgressMsg::Message {
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn closure_sink_delivers_messages_until_dropped() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&received);

        let (sink, handle) = closure_sink(16, move |msg| {
            if let ProgressMsg::Message { message } = msg {
                store.lock().unwrap().push(message);
            }
        });

        let progress = Some(sink);
        report_message(&progress, "first");
        report(&progress, ProgressMsg::FieldProgress { progress: 0.5 });
        report_message(&progress, "second");
        drop(progress);
        handle.join().unwrap();

        assert_eq!(*received.lock().unwrap(), vec!["first", "second"]);
    }
}
