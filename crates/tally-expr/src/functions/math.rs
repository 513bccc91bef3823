//! Math functions

use super::number_arg;
use crate::error::{ExprError, ExprResult};
use tally_core::Value;

fn first(name: &str, args: &[Value]) -> ExprResult<f64> {
    let arg = args
        .first()
        .ok_or_else(|| ExprError::Evaluation(format!("{}() requires an argument", name)))?;
    number_arg(name, arg)
}

macro_rules! unary_math {
    ($($fn_name:ident => $name:literal, $op:expr;)*) => {
        $(
            #[doc = concat!("`", $name, "(x)`")]
            pub fn $fn_name(args: &[Value]) -> ExprResult<Value> {
                let x = first($name, args)?;
                let op: fn(f64) -> f64 = $op;
                Ok(Value::Number(op(x)))
            }
        )*
    };
}

unary_math! {
    fn_abs => "abs", f64::abs;
    fn_sqrt => "sqrt", f64::sqrt;
    fn_exp => "exp", f64::exp;
    fn_expm1 => "expm1", f64::exp_m1;
    fn_log => "log", f64::ln;
    fn_log10 => "log10", f64::log10;
    fn_log1p => "log1p", f64::ln_1p;
    fn_floor => "floor", f64::floor;
    fn_ceil => "ceil", f64::ceil;
    fn_sin => "sin", f64::sin;
    fn_cos => "cos", f64::cos;
    fn_tan => "tan", f64::tan;
    fn_arcsin => "arcsin", f64::asin;
    fn_arccos => "arccos", f64::acos;
    fn_arctan => "arctan", f64::atan;
    fn_sinh => "sinh", f64::sinh;
    fn_cosh => "cosh", f64::cosh;
    fn_tanh => "tanh", f64::tanh;
}

/// ARCTAN2 function: angle of the point (x, y), called as `arctan2(y, x)`
pub fn fn_arctan2(args: &[Value]) -> ExprResult<Value> {
    let y = first("arctan2", args)?;
    let x = match args.get(1) {
        Some(v) => number_arg("arctan2", v)?,
        None => return Err(ExprError::Evaluation("arctan2() requires 2 arguments".into())),
    };
    Ok(Value::Number(y.atan2(x)))
}

/// ROUND function: `round(x)` or `round(x, digits)`, halves away from zero
pub fn fn_round(args: &[Value]) -> ExprResult<Value> {
    let x = first("round", args)?;
    let digits = match args.get(1) {
        // 10^308 is the largest finite power of ten
        Some(v) => number_arg("round", v)?.trunc().clamp(-308.0, 308.0) as i32,
        None => 0,
    };

    if digits == 0 {
        return Ok(Value::Number(x.round()));
    }

    if digits < 0 {
        let factor = 10f64.powi(-digits);
        return Ok(Value::Number((x / factor).round() * factor));
    }

    let factor = 10f64.powi(digits);
    let scaled = x * factor;
    if !scaled.is_finite() {
        // Already finer than f64 can resolve
        return Ok(Value::Number(x));
    }
    Ok(Value::Number(scaled.round() / factor))
}

/// MIN function
pub fn fn_min(args: &[Value]) -> ExprResult<Value> {
    fold_numbers("min", args, f64::min)
}

/// MAX function
pub fn fn_max(args: &[Value]) -> ExprResult<Value> {
    fold_numbers("max", args, f64::max)
}

fn fold_numbers(name: &str, args: &[Value], op: fn(f64, f64) -> f64) -> ExprResult<Value> {
    let mut acc: Option<f64> = None;

    for arg in args {
        let n = number_arg(name, arg)?;
        // NaN poisons the result
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        acc = Some(acc.map_or(n, |a| op(a, n)));
    }

    acc.map(Value::Number)
        .ok_or_else(|| ExprError::Evaluation(format!("{}() requires an argument", name)))
}
