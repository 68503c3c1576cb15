// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! # Fairshare Core
//!
//! Foundational utilities for the fairshare resource-sharing engine. The
//! crate collects the small building blocks the solver crates lean on:
//! precision-aware floating point comparisons and strongly typed handles
//! into slot arenas.
//!
//! ## Modules
//!
//! - `num`: Precision threshold (`Precision`) and the epsilon-aware helpers
//!   `double_positive`, `double_equals` and `double_update`, generic over
//!   `num_traits::Float`.
//! - `utils`: Phantom-tagged indices (`TypedIndex<T>`) and a slot arena
//!   (`Arena<T, V>`) handing out stable typed handles.
//!
//! ## Purpose
//!
//! Fluid resource-sharing models iterate until quantities vanish. Without a
//! shared notion of "numerically zero" those loops never terminate, and
//! without typed handles constraint and variable indices get mixed up.

pub mod num;
pub mod utils;
