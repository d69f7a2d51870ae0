use std::fmt::Debug;
use std::ops::Range;

use rand::Rng;
use rand::SeedableRng;

/// Abstraction for randomness, in order to swap out different sources of randomness.
///
/// This is especially useful when testing, to control which choices are made when random
/// values are required.
///
/// # Testing
/// We have also created an implementation of this trait which takes as input a list of `usize`s
/// and returns them in that order. This allows the user to define deterministic test-cases
/// while the implementation makes use of an implementation of the [`Random`] trait.
pub trait Random: Debug {
    /// Generates a random usize in the provided range with equal probability; this can be seen as
    /// sampling from a uniform distribution in the range `[range.start, range.end)`
    ///
    /// # Example
    /// This example will show how to use a concrete implementation of [`SeedableRng`] to implement
    /// selecting a random element from a list.
    /// ```rust
    /// # use rand::rngs::SmallRng;
    /// # use rand::SeedableRng;
    /// # use squash::Random;
    /// // First we create our random object
    /// let mut rng = SmallRng::seed_from_u64(42);
    /// // Then we create the elements to select from
    /// let elements = vec!["This", "is", "a", "test"];
    /// // Finally we generate a random number in the range [0, |elements|)
    /// let selected_index = rng.generate_usize_in_range(0..elements.len());
    /// assert!(selected_index < elements.len());
    /// ```
    fn generate_usize_in_range(&mut self, range: Range<usize>) -> usize;

    /// Reorders the elements of `slice` uniformly at random (a Fisher-Yates shuffle driven by
    /// [`Random::generate_usize_in_range`]).
    fn shuffle<T>(&mut self, slice: &mut [T])
    where
        Self: Sized,
    {
        for current in (1..slice.len()).rev() {
            let target = self.generate_usize_in_range(0..current + 1);
            slice.swap(current, target);
        }
    }
}

// We provide a blanket implementation of the trait for any type which implements `SeedableRng`,
// `Rng` and `Debug` to ensure that we can use any "regular" random generator where we expect an
// implementation of Random.
impl<T> Random for T
where
    T: SeedableRng + Rng + Debug,
{
    fn generate_usize_in_range(&mut self, range: Range<usize>) -> usize {
        self.gen_range(range)
    }
}
