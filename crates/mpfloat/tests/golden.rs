//! Golden end-to-end scenarios at radix 10.
//!
//! Reference digit strings are the true constants to more digits than
//! any test requests; printed values must be correctly-rounded prefixes.

use num_bigint::BigUint;

use mpfloat::{divide, exp, log, pi, sqrt, Apfloat, INFINITE};

const SQRT2: &str = "1.4142135623730950488016887242096980785696718753769480731766797379907324784621";
const LN2: &str = "0.6931471805599453094172321214581765680755001343602552541206800094933936219696";
const E: &str = "2.7182818284590452353602874713526624977572470936999595749669676277240766303535";

/// The printed value must be a correctly-rounded prefix of `reference`
/// carrying at least `min_digits` significant digits.
fn assert_matches_reference(value: &Apfloat, reference: &str, min_digits: usize) {
    let printed = value.to_string();
    let digits = |s: &str| -> Vec<u32> {
        s.chars().filter_map(|c| c.to_digit(10)).collect()
    };
    let got = digits(&printed);
    let want = digits(reference);
    assert!(
        got.len() >= min_digits,
        "only {} digits printed: {printed}",
        got.len()
    );
    assert!(got.len() <= want.len(), "reference too short for {printed}");

    let last = got.len() - 1;
    assert_eq!(&got[..last], &want[..last], "digit mismatch: {printed}");
    // The final digit is rounded to nearest.
    let diff = i64::from(got[last]) - i64::from(want[last]);
    assert!(diff.abs() <= 1, "bad final rounding: {printed}");

    // The leading structure (sign, radix point position) must agree.
    let structural: String = printed.chars().take(3).collect();
    assert!(reference.starts_with(&structural[..structural.len().min(3)]));
}

#[test]
fn golden_multiply_twenty_digits() {
    let a = Apfloat::parse("12345678901234567890", INFINITE, 10).unwrap();
    let b = Apfloat::parse("98765432109876543210", INFINITE, 10).unwrap();
    let product = a.multiply(&b).unwrap();
    assert_eq!(
        product.to_string(),
        "1219326311370217952237463801111263526900"
    );
}

#[test]
fn golden_pi_fifty_digits() {
    let value = pi(50, 10).unwrap();
    assert_eq!(
        value.to_string(),
        "3.1415926535897932384626433832795028841971693993751"
    );
}

#[test]
fn golden_log_of_two() {
    let x = Apfloat::integer_with_precision(2, 30, 10);
    let value = log(&x).unwrap();
    assert_eq!(value.to_string(), "0.693147180559945309417232121458");
}

#[test]
fn golden_sqrt_of_two() {
    let x = Apfloat::integer_with_precision(2, 40, 10);
    let value = sqrt(&x).unwrap();
    assert_matches_reference(&value, SQRT2, 38);
}

#[test]
fn golden_large_exact_square() {
    // (10^1000 + 1)^2, digit for digit against the reference integers.
    let mut digits = String::from("1");
    digits.push_str(&"0".repeat(999));
    digits.push('1');

    let x = Apfloat::parse(&digits, INFINITE, 10).unwrap();
    let square = x.multiply(&x).unwrap();

    let reference = BigUint::parse_bytes(digits.as_bytes(), 10).unwrap();
    let expected = (&reference * &reference).to_string();
    assert_eq!(square.to_string(), expected);
}

#[test]
fn golden_exp_of_one() {
    let x = Apfloat::integer_with_precision(1, 60, 10);
    let value = exp(&x).unwrap();
    assert_matches_reference(&value, E, 55);
}

#[test]
fn golden_ln2_high_precision() {
    let x = Apfloat::integer_with_precision(2, 70, 10);
    let value = log(&x).unwrap();
    assert_matches_reference(&value, LN2, 65);
}

#[test]
fn sqrt_squared_is_identity() {
    for value in [2i64, 3, 5, 10, 123_456] {
        let x = Apfloat::integer_with_precision(value, 60, 10);
        let s = sqrt(&x).unwrap();
        let square = s.multiply(&s).unwrap();
        let error = square.subtract(&x);
        assert!(
            error.is_zero() || error.scale() < x.scale() - 55,
            "sqrt({value})^2 error at scale {}",
            error.scale()
        );
    }
}

#[test]
fn exp_log_identities() {
    for value in [2i64, 7, 42] {
        let x = Apfloat::integer_with_precision(value, 45, 10);

        let there_and_back = exp(&log(&x).unwrap()).unwrap();
        let error = there_and_back.subtract(&x);
        assert!(
            error.is_zero() || error.scale() < x.scale() - 40,
            "exp(log({value})) error at scale {}",
            error.scale()
        );
    }
}

#[test]
fn division_against_multiplication() {
    let a = Apfloat::integer_with_precision(987_654_321, 50, 10);
    let b = Apfloat::integer_with_precision(123_456_789, 50, 10);
    let quotient = divide(&a, &b).unwrap();
    let product = quotient.multiply(&b).unwrap();
    let error = product.subtract(&a);
    assert!(
        error.is_zero() || error.scale() < a.scale() - 45,
        "a/b·b error at scale {}",
        error.scale()
    );
}

#[test]
fn pi_is_cached_across_calls() {
    let first = pi(40, 10).unwrap();
    let second = pi(25, 10).unwrap();
    assert!(first.to_string().starts_with(&second.to_string()[..20]));
}
