//! Rust definitions of the runtime library that compiled programs call.
//!
//! Strings cross the boundary as NUL-terminated `char*`; returned strings are
//! allocated here and released with `free_string`. Arrays arrive as a
//! pointer to the first element plus an element count.

use std::{
    borrow::Cow,
    cell::Cell,
    ffi::{c_char, CStr, CString},
    fs,
    io::{self, Write},
    process, slice, thread,
    time::Duration,
};

use crate::codegen::BOUNDS_FAIL;

use super::BOUNDS_FAIL_STATUS;

/// The address of the runtime definition of `name`, if there is one.
pub fn address_of(name: &str) -> Option<usize> {
    let address = match name {
        BOUNDS_FAIL => bounds_fail as usize,

        "math_sqrt" => math_sqrt as usize,
        "math_pow" => math_pow as usize,
        "math_abs_f64" => math_abs_f64 as usize,
        "math_abs_i32" => math_abs_i32 as usize,
        "math_sin" => math_sin as usize,
        "math_cos" => math_cos as usize,
        "math_tan" => math_tan as usize,
        "math_log" => math_log as usize,
        "math_exp" => math_exp as usize,
        "math_gcd" => math_gcd as usize,
        "math_lcm" => math_lcm as usize,
        "math_is_prime" => math_is_prime as usize,
        "math_fibonacci" => math_fibonacci as usize,
        "math_factorial" => math_factorial as usize,

        "string_reverse" => string_reverse as usize,
        "string_upper" => string_upper as usize,
        "string_lower" => string_lower as usize,
        "string_length" => string_length as usize,
        "string_substring" => string_substring as usize,
        "string_find" => string_find as usize,
        "string_concat" => string_concat as usize,
        "free_string" => free_string as usize,

        "array_sum_i32" | "simd_array_sum_i32" => array_sum_i32 as usize,
        "array_max_i32" | "simd_array_max_i32" => array_max_i32 as usize,
        "array_min_i32" | "simd_array_min_i32" => array_min_i32 as usize,
        "array_sort_i32" => array_sort_i32 as usize,
        "array_reverse_i32" => array_reverse_i32 as usize,
        "simd_array_multiply_i32" => simd_array_multiply_i32 as usize,
        "simd_array_add_i32" => simd_array_add_i32 as usize,
        "simd_array_count_equal_i32" => simd_array_count_equal_i32 as usize,

        "stats_mean" => stats_mean as usize,
        "stats_median" => stats_median as usize,
        "stats_stddev" => stats_stddev as usize,
        "geom_distance" => geom_distance as usize,
        "geom_circle_area" => geom_circle_area as usize,
        "geom_rectangle_area" => geom_rectangle_area as usize,
        "geom_triangle_area" => geom_triangle_area as usize,

        "file_read" => file_read as usize,
        "file_write" => file_write as usize,
        "file_exists" => file_exists as usize,

        "random_int" => random_int as usize,
        "random_double" => random_double as usize,
        "random_seed" => random_seed as usize,
        "sleep_ms" => sleep_ms as usize,
        _ => return None,
    };
    Some(address)
}

extern "C" fn bounds_fail(index: i32, len: i32) -> ! {
    let _ = writeln!(io::stderr(), "index {index} out of bounds for length {len}");
    // `exit` flushes the C library's buffered output.
    process::exit(BOUNDS_FAIL_STATUS)
}

/// Reads a C string, treating null as empty.
unsafe fn text<'a>(s: *const c_char) -> Cow<'a, str> {
    if s.is_null() {
        return Cow::Borrowed("");
    }
    CStr::from_ptr(s).to_string_lossy()
}

/// Hands `s` to the program. The caller releases it with `free_string`.
fn into_c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    let mut bytes: Vec<u8> = s.into();
    bytes.retain(|&b| b != 0);
    CString::new(bytes).unwrap_or_default().into_raw()
}

unsafe fn values<'a>(data: *mut i32, len: i32) -> &'a mut [i32] {
    match usize::try_from(len) {
        Ok(len) if len > 0 && !data.is_null() => slice::from_raw_parts_mut(data, len),
        _ => &mut [],
    }
}

extern "C" fn math_sqrt(x: f64) -> f64 {
    x.sqrt()
}

extern "C" fn math_pow(base: f64, exp: f64) -> f64 {
    base.powf(exp)
}

extern "C" fn math_abs_f64(x: f64) -> f64 {
    x.abs()
}

extern "C" fn math_abs_i32(x: i32) -> i32 {
    x.wrapping_abs()
}

extern "C" fn math_sin(x: f64) -> f64 {
    x.sin()
}

extern "C" fn math_cos(x: f64) -> f64 {
    x.cos()
}

extern "C" fn math_tan(x: f64) -> f64 {
    x.tan()
}

extern "C" fn math_log(x: f64) -> f64 {
    x.ln()
}

extern "C" fn math_exp(x: f64) -> f64 {
    x.exp()
}

extern "C" fn math_gcd(a: i32, b: i32) -> i32 {
    let (mut a, mut b) = (a.wrapping_abs(), b.wrapping_abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

extern "C" fn math_lcm(a: i32, b: i32) -> i32 {
    match math_gcd(a, b) {
        0 => 0,
        g => a.wrapping_div(g).wrapping_mul(b).wrapping_abs(),
    }
}

extern "C" fn math_is_prime(n: i32) -> i32 {
    let n = i64::from(n);
    i32::from(n >= 2 && (2..).take_while(|d| d * d <= n).all(|d| n % d != 0))
}

extern "C" fn math_fibonacci(n: i32) -> i32 {
    let (mut a, mut b) = (0i32, 1i32);
    for _ in 0..n.max(0) {
        (a, b) = (b, a.wrapping_add(b));
    }
    a
}

extern "C" fn math_factorial(n: i32) -> i32 {
    (1..=n.max(0)).fold(1, i32::wrapping_mul)
}

unsafe extern "C" fn string_reverse(s: *const c_char) -> *mut c_char {
    into_c_string(text(s).chars().rev().collect::<String>())
}

unsafe extern "C" fn string_upper(s: *const c_char) -> *mut c_char {
    into_c_string(text(s).to_uppercase())
}

unsafe extern "C" fn string_lower(s: *const c_char) -> *mut c_char {
    into_c_string(text(s).to_lowercase())
}

unsafe extern "C" fn string_length(s: *const c_char) -> i32 {
    if s.is_null() {
        return 0;
    }
    i32::try_from(CStr::from_ptr(s).to_bytes().len()).unwrap_or(i32::MAX)
}

/// Bytes `start..start + len`, clamped to the string.
unsafe extern "C" fn string_substring(s: *const c_char, start: i32, len: i32) -> *mut c_char {
    let bytes = if s.is_null() {
        &[][..]
    } else {
        CStr::from_ptr(s).to_bytes()
    };
    let start = usize::try_from(start).unwrap_or(0).min(bytes.len());
    let len = usize::try_from(len).unwrap_or(0);
    let end = start.saturating_add(len).min(bytes.len());
    into_c_string(&bytes[start..end])
}

/// Byte offset of the first occurrence of `needle`, or -1.
unsafe extern "C" fn string_find(haystack: *const c_char, needle: *const c_char) -> i32 {
    text(haystack)
        .find(&*text(needle))
        .and_then(|at| i32::try_from(at).ok())
        .unwrap_or(-1)
}

unsafe extern "C" fn string_concat(a: *const c_char, b: *const c_char) -> *mut c_char {
    into_c_string(text(a).into_owned() + &text(b))
}

/// Releases a string returned by the library. String literals must not be
/// passed here.
unsafe extern "C" fn free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

unsafe extern "C" fn array_sum_i32(data: *mut i32, len: i32) -> i32 {
    values(data, len).iter().fold(0, |acc, v| acc.wrapping_add(*v))
}

unsafe extern "C" fn array_max_i32(data: *mut i32, len: i32) -> i32 {
    values(data, len).iter().copied().max().unwrap_or(0)
}

unsafe extern "C" fn array_min_i32(data: *mut i32, len: i32) -> i32 {
    values(data, len).iter().copied().min().unwrap_or(0)
}

unsafe extern "C" fn array_sort_i32(data: *mut i32, len: i32) {
    values(data, len).sort_unstable();
}

unsafe extern "C" fn array_reverse_i32(data: *mut i32, len: i32) {
    values(data, len).reverse();
}

unsafe extern "C" fn simd_array_multiply_i32(data: *mut i32, len: i32, factor: i32) {
    for v in values(data, len) {
        *v = v.wrapping_mul(factor);
    }
}

unsafe extern "C" fn simd_array_add_i32(data: *mut i32, len: i32, addend: i32) {
    for v in values(data, len) {
        *v = v.wrapping_add(addend);
    }
}

unsafe extern "C" fn simd_array_count_equal_i32(data: *mut i32, len: i32, needle: i32) -> i32 {
    let count = values(data, len).iter().filter(|&&v| v == needle).count();
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// Mean and population standard deviation; zero for an empty array.
fn moments(values: &[i32]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| (f64::from(v) - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

unsafe extern "C" fn stats_mean(data: *mut i32, len: i32) -> f64 {
    moments(values(data, len)).0
}

unsafe extern "C" fn stats_stddev(data: *mut i32, len: i32) -> f64 {
    moments(values(data, len)).1
}

/// Median of a sorted copy; the array itself is left untouched.
unsafe extern "C" fn stats_median(data: *mut i32, len: i32) -> f64 {
    let mut sorted = values(data, len).to_vec();
    sorted.sort_unstable();
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => f64::from(sorted[n / 2]),
        n => (f64::from(sorted[n / 2 - 1]) + f64::from(sorted[n / 2])) / 2.0,
    }
}

extern "C" fn geom_distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    (x2 - x1).hypot(y2 - y1)
}

extern "C" fn geom_circle_area(radius: f64) -> f64 {
    std::f64::consts::PI * radius.powi(2)
}

extern "C" fn geom_rectangle_area(width: f64, height: f64) -> f64 {
    width * height
}

extern "C" fn geom_triangle_area(base: f64, height: f64) -> f64 {
    0.5 * base * height
}

/// The file's contents, or an empty string when it cannot be read.
unsafe extern "C" fn file_read(path: *const c_char) -> *mut c_char {
    let contents = fs::read(&*text(path)).unwrap_or_default();
    into_c_string(contents)
}

unsafe extern "C" fn file_write(path: *const c_char, contents: *const c_char) -> i32 {
    if path.is_null() || contents.is_null() {
        return 0;
    }
    let contents = CStr::from_ptr(contents).to_bytes();
    i32::from(fs::write(&*text(path), contents).is_ok())
}

unsafe extern "C" fn file_exists(path: *const c_char) -> i32 {
    if path.is_null() {
        return 0;
    }
    i32::from(fs::metadata(&*text(path)).is_ok())
}

thread_local! {
    static RANDOM_STATE: Cell<u64> = const { Cell::new(0x2545_F491_4F6C_DD1D) };
}

/// xorshift64*
fn next_random() -> u64 {
    RANDOM_STATE.with(|state| {
        let mut x = state.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        state.set(x);
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    })
}

extern "C" fn random_seed(seed: i32) {
    RANDOM_STATE.with(|state| state.set(u64::from(seed as u32) | 1));
}

/// A value in `min..=max`; the bounds are swapped when reversed.
extern "C" fn random_int(min: i32, max: i32) -> i32 {
    let (lo, hi) = (i64::from(min.min(max)), i64::from(min.max(max)));
    let span = (hi - lo + 1) as u64;
    (lo + (next_random() % span) as i64) as i32
}

/// A value in `[0, 1)`.
extern "C" fn random_double() -> f64 {
    (next_random() >> 11) as f64 / (1u64 << 53) as f64
}

extern "C" fn sleep_ms(ms: i32) {
    thread::sleep(Duration::from_millis(u64::try_from(ms).unwrap_or(0)));
}
