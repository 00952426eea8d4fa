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

//! Provides foundational primitives for event-driven communication.
//!
//! Two flavours are offered:
//!
//! - [`EventBus`], a thread-safe multi-producer channel whose consumer drains it at
//!   well-defined synchronization points (the frame loop uses it for its mailbox).
//! - [`Observers`], an owned listener list invoked synchronously, in registration
//!   order, with every listener isolated from the failures of the others.

mod bus;
mod observers;

pub use self::bus::EventBus;
pub use self::observers::{ObserverId, Observers};
