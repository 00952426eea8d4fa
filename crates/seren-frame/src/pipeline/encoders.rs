// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use seren_core::renderer::{FrameEncoder, PresentedFrame};

/// Identifies an encoder attached to a [`ViewPipeline`](super::ViewPipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncoderId(u64);

/// The encoders attached to one view.
#[derive(Default)]
pub(crate) struct EncoderSet {
    encoders: Vec<(EncoderId, Box<dyn FrameEncoder>)>,
    next_id: u64,
}

impl EncoderSet {
    pub fn attach(&mut self, encoder: Box<dyn FrameEncoder>) -> EncoderId {
        self.next_id += 1;
        let id = EncoderId(self.next_id);
        self.encoders.push((id, encoder));
        id
    }

    /// Removes and finalizes an encoder.
    pub fn detach(&mut self, id: EncoderId, view: &str) -> bool {
        let Some(position) = self.encoders.iter().position(|(e, _)| *e == id) else {
            return false;
        };
        let (_, encoder) = self.encoders.remove(position);
        finish(encoder, view);
        true
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    /// Hands `frame` to every encoder. Encoders that fail are detached and
    /// finalized; the others keep receiving frames. Returns how many failed.
    pub fn push(&mut self, frame: &PresentedFrame, view: &str) -> usize {
        let mut failed = Vec::new();
        let mut i = 0;
        while i < self.encoders.len() {
            match self.encoders[i].1.push_frame(frame) {
                Ok(()) => i += 1,
                Err(e) => {
                    let (_, encoder) = self.encoders.remove(i);
                    log::warn!(
                        "View '{view}': encoder '{}' failed on frame {}, detaching it: {e:#}",
                        encoder.name(),
                        frame.frame_number
                    );
                    failed.push(encoder);
                }
            }
        }
        let count = failed.len();
        for encoder in failed {
            finish(encoder, view);
        }
        count
    }

    /// Finalizes every encoder.
    pub fn finish_all(&mut self, view: &str) {
        for (_, encoder) in self.encoders.drain(..) {
            finish(encoder, view);
        }
    }
}

fn finish(mut encoder: Box<dyn FrameEncoder>, view: &str) {
    match encoder.finish() {
        Ok(()) => log::debug!("View '{view}': encoder '{}' finalized.", encoder.name()),
        Err(e) => log::warn!(
            "View '{view}': encoder '{}' failed to finalize: {e:#}",
            encoder.name()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seren_core::math::Extent2D;
    use seren_core::renderer::{DeviceIndex, TargetHandle};
    use std::sync::{Arc, Mutex};

    struct Recorder {
        name: &'static str,
        fail_on: Option<u64>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl FrameEncoder for Recorder {
        fn name(&self) -> &str {
            self.name
        }
        fn push_frame(&mut self, frame: &PresentedFrame) -> anyhow::Result<()> {
            if self.fail_on == Some(frame.frame_number) {
                anyhow::bail!("disk full");
            }
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, frame.frame_number));
            Ok(())
        }
        fn finish(&mut self) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("{}:finish", self.name));
            Ok(())
        }
    }

    fn frame(number: u64) -> PresentedFrame {
        PresentedFrame {
            frame_number: number,
            device: DeviceIndex(0),
            color_target: TargetHandle(1),
            size: Extent2D::new(64, 64),
        }
    }

    #[test]
    fn failing_encoder_is_finalized_without_affecting_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set = EncoderSet::default();
        for (name, fail_on) in [("a", Some(2)), ("b", None)] {
            set.attach(Box::new(Recorder {
                name,
                fail_on,
                log: Arc::clone(&log),
            }));
        }

        assert_eq!(set.push(&frame(1), "main"), 0);
        assert_eq!(set.push(&frame(2), "main"), 1);
        assert_eq!(set.push(&frame(3), "main"), 0);
        assert_eq!(set.len(), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:1", "b:1", "b:2", "a:finish", "b:3"]
        );
    }

    #[test]
    fn detach_finalizes_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set = EncoderSet::default();
        let id = set.attach(Box::new(Recorder {
            name: "a",
            fail_on: None,
            log: Arc::clone(&log),
        }));

        assert!(set.detach(id, "main"));
        assert!(!set.detach(id, "main"));
        assert_eq!(*log.lock().unwrap(), vec!["a:finish"]);
    }
}
