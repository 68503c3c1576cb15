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

use fairshare_core::utils::index::{TypedIndex, TypedIndexTag};

/// A tag type for constraint indices.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ConstraintIndexTag;

impl TypedIndexTag for ConstraintIndexTag {
    const NAME: &'static str = "ConstraintIndex";
}

/// A typed index for constraints.
pub type ConstraintIndex = TypedIndex<ConstraintIndexTag>;

/// A tag type for variable indices.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VariableIndexTag;

impl TypedIndexTag for VariableIndexTag {
    const NAME: &'static str = "VariableIndex";
}

/// A typed index for variables.
pub type VariableIndex = TypedIndex<VariableIndexTag>;

/// A tag type for element indices.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ElementIndexTag;

impl TypedIndexTag for ElementIndexTag {
    const NAME: &'static str = "ElementIndex";
}

/// A typed index for elements, the (constraint, variable) incidences.
pub type ElementIndex = TypedIndex<ElementIndexTag>;
