/*
 * Copyright 2026 Molock Team
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! OpenAPI-driven mock server.
//!
//! A specification document is turned into a directory tree of JSON response
//! files (one directory per path + method, one file per declared response and a
//! `status.json` selecting the active one). The runtime router answers live
//! requests from that tree, honouring the selected file and its simulated delay.

pub mod config;
pub mod registry;
pub mod router;
pub mod server;
pub mod spec;
pub mod storage;
pub mod telemetry;
pub mod utils;

pub use config::{Config, ConfigLoader};
pub use registry::EndpointRegistry;
pub use router::RuntimeRouter;
pub use spec::{HttpMethod, SpecPipeline};
pub use storage::MockStore;
