//! # Frkl Processor Chain
//!
//! Configuration documents are turned into environment and task records by a
//! chain of small processors. Each processor consumes one item at a time and
//! may emit zero or more items for the next stage; a stage that buffers
//! (such as the inventory compiler) emits the rest of its output when the
//! chain is finalized.
//!
//! ## Stages
//!
//! - [`UrlAbbrev`]: expands `gh:`-style abbreviations.
//! - [`EnsureUrl`]: loads a local path or remote URL into a [`RawDocument`].
//! - [`EnsureYaml`]: parses the raw text into a [`Document`].
//! - [`Frkl`]: flattens nested, abbreviated records into leaf records
//!   according to a [`FrklFormat`].
//! - [`AugmentingTask`]: applies task aliases and the uppercase rewrite.
//! - [`DynamicRoleBuilder`]: folds runs of module tasks into synthetic roles.
//!
//! Stages are composed with [`ProcessorExt::then`] and driven with [`run`].
//! Any error aborts the whole run.

mod augment;
mod dynamic_role;
mod flatten;
mod load;

pub use augment::AugmentingTask;
pub use dynamic_role::{DynamicRole, DynamicRoleBuilder};
pub use flatten::{Frkl, FrklFormat};
pub use load::{Document, EnsureUrl, EnsureYaml, RawDocument, UrlAbbrev};

use crate::error::Result;

/// One stage of a processing chain.
pub trait Processor {
    type Input;
    type Output;

    /// Processes one item, emitting zero or more items downstream.
    fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>>;

    /// Called once after the last input; emits any buffered items.
    fn finalize(&mut self) -> Result<Vec<Self::Output>> {
        Ok(Vec::new())
    }
}

impl<P: Processor + ?Sized> Processor for &mut P {
    type Input = P::Input;
    type Output = P::Output;

    fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        (**self).process(item)
    }

    fn finalize(&mut self) -> Result<Vec<Self::Output>> {
        (**self).finalize()
    }
}

/// Two processors run back to back.
#[derive(Debug)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Chain<A, B> {
    /// Splits the chain back into its stages.
    pub fn into_parts(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A, B> Processor for Chain<A, B>
where
    A: Processor,
    B: Processor<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        let mut output = Vec::new();
        for intermediate in self.first.process(item)? {
            output.extend(self.second.process(intermediate)?);
        }
        Ok(output)
    }

    fn finalize(&mut self) -> Result<Vec<Self::Output>> {
        let mut output = Vec::new();
        for intermediate in self.first.finalize()? {
            output.extend(self.second.process(intermediate)?);
        }
        output.extend(self.second.finalize()?);
        Ok(output)
    }
}

/// Chaining helper available on every processor.
pub trait ProcessorExt: Processor + Sized {
    /// Feeds this processor's output into `next`.
    fn then<B>(self, next: B) -> Chain<Self, B>
    where
        B: Processor<Input = Self::Output>,
    {
        Chain {
            first: self,
            second: next,
        }
    }
}

impl<P: Processor> ProcessorExt for P {}

/// Pushes every input through `processor`, then finalizes it.
pub fn run<P, I>(processor: &mut P, inputs: I) -> Result<Vec<P::Output>>
where
    P: Processor,
    I: IntoIterator<Item = P::Input>,
{
    let mut output = Vec::new();
    for input in inputs {
        output.extend(processor.process(input)?);
    }
    output.extend(processor.finalize()?);
    Ok(output)
}
