//! Parsers for common pieces of text based formats.
use num_traits::{
    ops::overflowing::{OverflowingAdd, OverflowingMul, OverflowingSub},
    FromPrimitive, Zero,
};
use thiserror::Error;

use crate::{literal, or, Error, Parser, Parsed, PositionedError, State};

/// A parsed number does not fit into the requested integer type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("number does not fit into `{target}`")]
pub struct NumberOverflow {
    /// Name of the integer type.
    pub target: &'static str,
}

fn overflow<'a, I, T>(state: &State<'a>) -> Parsed<'a, T> {
    let err = NumberOverflow {
        target: std::any::type_name::<I>(),
    };
    Err(crate::Failure::new(
        PositionedError::new(state.position(), err).into(),
        state.clone(),
    ))
}

/// Passes over ASCII digits starting at `state`, accumulating them using `step`.
///
/// Returns the accumulated value, whether it overflowed, and the state after the last digit.
/// Returns `None` when there is no digit.
fn digits<'a, I>(
    state: &State<'a>,
    mut value: I,
    step: impl Fn(&I, &I) -> (I, bool),
) -> Result<Option<(I, bool, State<'a>)>, Error>
where
    I: FromPrimitive + OverflowingMul,
{
    let mut overflowed = false;
    let mut next = state.clone();
    let mut count = 0usize;
    loop {
        match next.byte() {
            Ok((digit @ b'0'..=b'9', after)) => {
                match I::from_u8(10).zip(I::from_u8(digit - b'0')) {
                    Some((ten, unit)) => {
                        let (shifted, mul_overflow) = value.overflowing_mul(&ten);
                        let (stepped, step_overflow) = step(&shifted, &unit);
                        overflowed |= mul_overflow | step_overflow;
                        value = stepped;
                    }
                    None => overflowed = true,
                }
                count += 1;
                next = after;
            }
            Ok(_) | Err(Error::EndOfInput) => break,
            Err(err) => return Err(err),
        }
    }
    Ok((count > 0).then_some((value, overflowed, next)))
}

/// Parses one or more ASCII digits as decimal number.
///
/// Fails with [`Error::NoMatch`] if there is no digit. A number that does not fit into `I` fails
/// with a [`NumberOverflow`] error positioned at the first digit. In both cases no input is
/// consumed.
pub fn ascii_digits<'a, I>() -> impl Parser<'a, Output = I>
where
    I: Zero + FromPrimitive + OverflowingAdd + OverflowingMul,
{
    |state: &State<'a>| match digits(state, I::zero(), |value, digit| {
        value.overflowing_add(digit)
    }) {
        Ok(Some((value, false, next))) => Ok((value, next)),
        Ok(Some((_, true, _))) => overflow::<I, I>(state),
        Ok(None) => Err(crate::Failure::new(Error::NoMatch, state.clone())),
        Err(err) => Err(crate::Failure::new(err, state.clone())),
    }
}

/// Parses ASCII digits, optionally prefixed by `'-'`, as decimal number.
///
/// A lone `'-'` not followed by a digit does not match. Negative numbers are accumulated
/// downwards, so the smallest value of a signed type is accepted. An explicit `'+'` sign is not
/// handled.
pub fn signed_ascii_digits<'a, I>() -> impl Parser<'a, Output = I>
where
    I: Zero + FromPrimitive + OverflowingAdd + OverflowingSub + OverflowingMul,
{
    |state: &State<'a>| {
        let (negative, start) = match state.byte() {
            Ok((b'-', after)) => (true, after),
            _ => (false, state.clone()),
        };
        let parsed = if negative {
            digits(&start, I::zero(), |value, digit| value.overflowing_sub(digit))
        } else {
            digits(&start, I::zero(), |value, digit| value.overflowing_add(digit))
        };
        match parsed {
            Ok(Some((value, false, next))) => Ok((value, next)),
            Ok(Some((_, true, _))) => overflow::<I, I>(state),
            Ok(None) => Err(crate::Failure::new(Error::NoMatch, state.clone())),
            Err(err) => Err(crate::Failure::new(err, state.clone())),
        }
    }
}

/// Matches a line break, either `"\n"` or `"\r\n"`.
pub fn newline<'a>() -> impl Parser<'a, Output = ()> {
    or(literal("\n"), literal("\r\n"))
}
