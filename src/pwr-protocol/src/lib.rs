// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod codec;
pub mod queues;
pub mod types;

pub use codec::{decode_command, encode_event, CodecError};
pub use types::{ClosedKey, CommandMessage, ReaderEvent, StateEvent, NIL_JOB_GUID};
