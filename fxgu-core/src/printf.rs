/// Minimal `sprintf`/`vsprintf` writing into fixed output buffers
use std::cell::Cell;
use std::fmt::{self, Write};

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, map_res, opt, value},
    multi::fold_many0,
    sequence::preceded,
    IResult,
};
use thiserror::Error;

/// One formatting argument
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    Int(i64),
    Uint(u64),
    Float(f32),
    Double(f64),
    Char(u8),
    Str(&'a str),
    Ptr(usize),
    /// Target of `%n`
    Count(&'a Cell<i32>),
}

macro_rules! arg_from {
    ($variant:ident as $wide:ty: $($ty:ty),*) => {
        $(impl<'a> From<$ty> for Arg<'a> {
            fn from(v: $ty) -> Self {
                Arg::$variant(v as $wide)
            }
        })*
    };
}

arg_from!(Int as i64: i8, i16, i32, i64, isize);
arg_from!(Uint as u64: u16, u32, u64, usize);

impl<'a> From<u8> for Arg<'a> {
    fn from(v: u8) -> Self {
        Arg::Char(v)
    }
}

impl<'a> From<f32> for Arg<'a> {
    fn from(v: f32) -> Self {
        Arg::Float(v)
    }
}

impl<'a> From<f64> for Arg<'a> {
    fn from(v: f64) -> Self {
        Arg::Double(v)
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(v: &'a str) -> Self {
        Arg::Str(v)
    }
}

impl<'a> From<&'a Cell<i32>> for Arg<'a> {
    fn from(v: &'a Cell<i32>) -> Self {
        Arg::Count(v)
    }
}

impl<'a, T> From<*const T> for Arg<'a> {
    fn from(v: *const T) -> Self {
        Arg::Ptr(v as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("output needs {needed} bytes but the buffer holds {capacity}")]
    Overflow { needed: usize, capacity: usize },
    #[error("conversion needs argument {index} but none was given")]
    MissingArgument { index: usize },
    #[error("argument {index} cannot be formatted with %{conversion}")]
    ArgumentType { index: usize, conversion: char },
    #[error("unknown conversion %{0}")]
    UnknownConversion(char),
    #[error("format ends inside a conversion")]
    Incomplete,
}

/// Format into `buffer`, returning the length written excluding the NUL.
///
/// ```
/// use fxgu_core::sprintf;
///
/// let mut buf = [0u8; 16];
/// let n = sprintf!(&mut buf, "%d-%s", 7, "ok").unwrap();
/// assert_eq!(&buf[..=n], b"7-ok\0");
/// ```
#[macro_export]
macro_rules! sprintf {
    ($buffer:expr, $format:expr $(, $arg:expr)* $(,)?) => {
        $crate::printf::vsprintf($buffer, $format, &[$($crate::printf::Arg::from($arg)),*])
    };
}

/// Format `args` into `buffer` according to `format`.
///
/// Behaves like the C family for integer, string and character
/// conversions, except that:
///
/// 1. `%f`, `%e`, `%g` and `%a` take a single precision float. A double
///    argument is narrowed to `f32` unless the `l`, `ll` or `L` length
///    modifier is present, in which case it keeps full precision.
/// 2. `L` is treated as `ll`; there is no 128-bit long double.
/// 3. `l` is ignored for `%c` and `%s`.
/// 4. Integers follow a 32-bit target: no modifier, `l`, `z` and `t` all
///    mean 32 bits, `ll`, `L` and `j` mean 64.
///
/// Nothing is allocated. Output is bounded by `buffer` and always
/// NUL-terminated. When the text does not fit, the truncated prefix is
/// kept and [`FormatError::Overflow`] reports the capacity that would have
/// been needed.
pub fn vsprintf(buffer: &mut [u8], format: &str, args: &[Arg<'_>]) -> Result<usize, FormatError> {
    let mut out = Sink::new(buffer);
    let mut args = ArgList { args, next: 0 };
    let mut input = format;

    while !input.is_empty() {
        let (rest, piece) = piece(input).map_err(|_| diagnose(input))?;
        match piece {
            Piece::Literal(text) => out.put(text.as_bytes()),
            Piece::Conversion(spec) => write_conversion(&mut out, &spec, &mut args)?,
        }
        input = rest;
    }

    out.finish()
}

/// Byte output shared by the bounded sink and the length counter
trait Emit: Write {
    fn put(&mut self, bytes: &[u8]);
    fn repeat(&mut self, byte: u8, count: usize);
}

/// Measures a rendering without storing it
struct Counter(usize);

impl Write for Counter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

impl Emit for Counter {
    fn put(&mut self, bytes: &[u8]) {
        self.0 = self.0.saturating_add(bytes.len());
    }

    fn repeat(&mut self, _byte: u8, count: usize) {
        self.0 = self.0.saturating_add(count);
    }
}

struct Sink<'b> {
    buffer: &'b mut [u8],
    len: usize,
}

impl<'b> Sink<'b> {
    fn new(buffer: &'b mut [u8]) -> Self {
        Self { buffer, len: 0 }
    }

    /// Bytes still free, keeping one back for the terminator
    fn room(&self) -> usize {
        self.buffer.len().saturating_sub(1).saturating_sub(self.len)
    }

    fn finish(self) -> Result<usize, FormatError> {
        let capacity = self.buffer.len();
        let needed = self.len.saturating_add(1);
        if needed > capacity {
            if let Some(last) = self.buffer.last_mut() {
                *last = 0;
            }
            log::debug!("sprintf output truncated: {needed} bytes into {capacity}");
            return Err(FormatError::Overflow { needed, capacity });
        }
        self.buffer[self.len] = 0;
        Ok(self.len)
    }
}

impl Write for Sink<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put(s.as_bytes());
        Ok(())
    }
}

impl Emit for Sink<'_> {
    fn put(&mut self, bytes: &[u8]) {
        // Past capacity only the length keeps counting
        let n = bytes.len().min(self.room());
        if n > 0 {
            self.buffer[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        }
        self.len = self.len.saturating_add(bytes.len());
    }

    fn repeat(&mut self, byte: u8, count: usize) {
        let n = count.min(self.room());
        if n > 0 {
            self.buffer[self.len..self.len + n].fill(byte);
        }
        self.len = self.len.saturating_add(count);
    }
}

struct ArgList<'a, 'b> {
    args: &'b [Arg<'a>],
    next: usize,
}

impl<'a, 'b> ArgList<'a, 'b> {
    fn next_arg(&mut self) -> Result<(usize, Arg<'a>), FormatError> {
        let index = self.next;
        let arg = self
            .args
            .get(index)
            .copied()
            .ok_or(FormatError::MissingArgument { index })?;
        self.next += 1;
        Ok((index, arg))
    }

    fn int(&mut self, conversion: char) -> Result<i64, FormatError> {
        match self.next_arg()? {
            (_, Arg::Int(v)) => Ok(v),
            (_, Arg::Uint(v)) => Ok(v as i64),
            (_, Arg::Char(c)) => Ok(c as i64),
            (index, _) => Err(FormatError::ArgumentType { index, conversion }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    left: bool,
    plus: bool,
    space: bool,
    alt: bool,
    zero: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Count {
    Fixed(usize),
    Star,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Length {
    Default,
    Char,
    Short,
    Long,
    LongLong,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Spec {
    flags: Flags,
    width: Option<Count>,
    precision: Option<Count>,
    length: Length,
    conversion: char,
}

#[derive(Debug, PartialEq, Eq)]
enum Piece<'a> {
    Literal(&'a str),
    Conversion(Spec),
}

fn piece(input: &str) -> IResult<&str, Piece<'_>> {
    alt((
        map(take_till1(|c: char| c == '%'), Piece::Literal),
        map(conversion, Piece::Conversion),
    ))(input)
}

fn conversion(input: &str) -> IResult<&str, Spec> {
    let (input, _) = char('%')(input)?;
    let (input, flags) = flags(input)?;
    let (input, width) = opt(width)(input)?;
    let (input, precision) = opt(preceded(char('.'), precision))(input)?;
    let (input, length) = opt(length)(input)?;
    let (input, conversion) = one_of("diouxXcspnfFeEgGaA%")(input)?;

    Ok((
        input,
        Spec {
            flags,
            width,
            precision,
            length: length.unwrap_or(Length::Default),
            conversion,
        },
    ))
}

fn flags(input: &str) -> IResult<&str, Flags> {
    fold_many0(one_of("-+ #0"), Flags::default, |mut flags, c| {
        match c {
            '-' => flags.left = true,
            '+' => flags.plus = true,
            ' ' => flags.space = true,
            '#' => flags.alt = true,
            _ => flags.zero = true,
        }
        flags
    })(input)
}

fn width(input: &str) -> IResult<&str, Count> {
    alt((
        value(Count::Star, char('*')),
        map_res(digit1, |s: &str| s.parse().map(Count::Fixed)),
    ))(input)
}

fn precision(input: &str) -> IResult<&str, Count> {
    // A lone '.' means precision zero
    alt((
        value(Count::Star, char('*')),
        map_res(digit0, |s: &str| {
            if s.is_empty() {
                Ok(Count::Fixed(0))
            } else {
                s.parse().map(Count::Fixed)
            }
        }),
    ))(input)
}

fn length(input: &str) -> IResult<&str, Length> {
    alt((
        value(Length::Char, tag("hh")),
        value(Length::Short, tag("h")),
        value(Length::LongLong, tag("ll")),
        value(Length::Long, tag("l")),
        value(Length::LongLong, one_of("Lj")),
        value(Length::Size, one_of("zt")),
    ))(input)
}

/// Explain why a conversion starting at `input` failed to parse
fn diagnose(input: &str) -> FormatError {
    input
        .chars()
        .skip(1)
        .find(|c| !"-+ #0123456789.*hlLjzt".contains(*c))
        .map_or(FormatError::Incomplete, FormatError::UnknownConversion)
}

struct Resolved {
    flags: Flags,
    width: usize,
    precision: Option<usize>,
}

fn resolve(spec: &Spec, args: &mut ArgList<'_, '_>) -> Result<Resolved, FormatError> {
    let mut flags = spec.flags;
    let width = match spec.width {
        Some(Count::Fixed(w)) => w,
        Some(Count::Star) => {
            // A negative '*' width means left-justify
            let w = args.int('*')? as i32;
            if w < 0 {
                flags.left = true;
            }
            w.unsigned_abs() as usize
        }
        None => 0,
    };
    let precision = match spec.precision {
        Some(Count::Fixed(p)) => Some(p),
        Some(Count::Star) => {
            let p = args.int('*')? as i32;
            (p >= 0).then_some(p as usize)
        }
        None => None,
    };
    Ok(Resolved {
        flags,
        width,
        precision,
    })
}

fn write_conversion(
    out: &mut Sink<'_>,
    spec: &Spec,
    args: &mut ArgList<'_, '_>,
) -> Result<(), FormatError> {
    let r = resolve(spec, args)?;
    let conv = spec.conversion;

    match conv {
        '%' => out.put(b"%"),
        'd' | 'i' => {
            let v = narrow_signed(args.int(conv)?, spec.length);
            let sign = sign_prefix(v < 0, &r.flags);
            write_integer(out, &r, sign, v.unsigned_abs(), conv);
        }
        'u' | 'o' | 'x' | 'X' => {
            let v = narrow_unsigned(args.int(conv)? as u64, spec.length);
            let prefix = match conv {
                'x' if r.flags.alt && v != 0 => "0x",
                'X' if r.flags.alt && v != 0 => "0X",
                _ => "",
            };
            write_integer(out, &r, prefix, v, conv);
        }
        'c' => {
            let c = match args.next_arg()? {
                (_, Arg::Char(c)) => c,
                (_, Arg::Int(v)) => v as u8,
                (_, Arg::Uint(v)) => v as u8,
                (index, _) => return Err(FormatError::ArgumentType { index, conversion: conv }),
            };
            field(out, &r, false, &[], &|w: &mut dyn Emit| {
                w.put(&[c]);
                Ok(())
            });
        }
        's' => {
            let s = match args.next_arg()? {
                (_, Arg::Str(s)) => s.as_bytes(),
                (index, _) => return Err(FormatError::ArgumentType { index, conversion: conv }),
            };
            let s = match r.precision {
                Some(p) if p < s.len() => &s[..p],
                _ => s,
            };
            field(out, &r, false, &[], &|w: &mut dyn Emit| {
                w.put(s);
                Ok(())
            });
        }
        'p' => {
            let p = match args.next_arg()? {
                (_, Arg::Ptr(p)) => p,
                (_, Arg::Uint(v)) => v as usize,
                (_, Arg::Int(v)) => v as usize,
                (index, _) => return Err(FormatError::ArgumentType { index, conversion: conv }),
            };
            if p == 0 {
                field(out, &r, false, &[], &|w: &mut dyn Emit| w.write_str("(nil)"));
            } else {
                field(out, &r, false, &["0x"], &|w: &mut dyn Emit| write!(w, "{p:x}"));
            }
        }
        'n' => match args.next_arg()? {
            (_, Arg::Count(cell)) => cell.set(out.len as i32),
            (index, _) => return Err(FormatError::ArgumentType { index, conversion: conv }),
        },
        _ => {
            let v = match (args.next_arg()?, spec.length) {
                ((_, Arg::Float(f)), _) => f as f64,
                ((_, Arg::Double(d)), Length::Long | Length::LongLong) => d,
                ((_, Arg::Double(d)), _) => d as f32 as f64,
                ((index, _), _) => {
                    return Err(FormatError::ArgumentType { index, conversion: conv })
                }
            };
            write_float(out, &r, v, conv);
        }
    }
    Ok(())
}

fn narrow_signed(v: i64, length: Length) -> i64 {
    match length {
        Length::Char => v as i8 as i64,
        Length::Short => v as i16 as i64,
        Length::LongLong => v,
        Length::Default | Length::Long | Length::Size => v as i32 as i64,
    }
}

fn narrow_unsigned(v: u64, length: Length) -> u64 {
    match length {
        Length::Char => v as u8 as u64,
        Length::Short => v as u16 as u64,
        Length::LongLong => v,
        Length::Default | Length::Long | Length::Size => v as u32 as u64,
    }
}

fn sign_prefix(negative: bool, flags: &Flags) -> &'static str {
    if negative {
        "-"
    } else if flags.plus {
        "+"
    } else if flags.space {
        " "
    } else {
        ""
    }
}

fn digits<W: Write + ?Sized>(w: &mut W, v: u64, conv: char) -> fmt::Result {
    match conv {
        'o' => write!(w, "{v:o}"),
        'x' => write!(w, "{v:x}"),
        'X' => write!(w, "{v:X}"),
        _ => write!(w, "{v}"),
    }
}

fn write_integer(out: &mut Sink<'_>, r: &Resolved, prefix: &str, v: u64, conv: char) {
    let shown = !(r.precision == Some(0) && v == 0);
    let mut len = Counter(0);
    if shown {
        let _ = digits(&mut len, v, conv);
    }
    let mut zeros = r.precision.map_or(0, |p| p.saturating_sub(len.0));
    // '#' with 'o' forces a leading zero unless one is already there
    if conv == 'o' && r.flags.alt && zeros == 0 && !(shown && v == 0) {
        zeros = 1;
    }
    // An explicit precision disables zero padding
    field(out, r, r.precision.is_none(), &[prefix], &|w: &mut dyn Emit| {
        w.repeat(b'0', zeros);
        if shown {
            digits(w, v, conv)?;
        }
        Ok(())
    });
}

/// Emit `prefix` and the body padded to the field width.
///
/// The body runs twice, once against a [`Counter`] to size the padding and
/// once into the sink.
fn field(
    out: &mut Sink<'_>,
    r: &Resolved,
    zero_ok: bool,
    prefix: &[&str],
    body: &dyn Fn(&mut dyn Emit) -> fmt::Result,
) {
    // Neither writer can fail, so the body's result carries nothing
    let mut len = Counter(prefix.iter().map(|p| p.len()).sum());
    let _ = body(&mut len);
    let fill = r.width.saturating_sub(len.0);
    let zero_fill = !r.flags.left && r.flags.zero && zero_ok;

    if !r.flags.left && !zero_fill {
        out.repeat(b' ', fill);
    }
    for p in prefix {
        out.put(p.as_bytes());
    }
    if zero_fill {
        out.repeat(b'0', fill);
    }
    let _ = body(out);
    if r.flags.left {
        out.repeat(b' ', fill);
    }
}

fn write_float(out: &mut Sink<'_>, r: &Resolved, v: f64, conv: char) {
    let upper = conv.is_ascii_uppercase();
    let sign = sign_prefix(v.is_sign_negative(), &r.flags);
    let abs = v.abs();

    if !abs.is_finite() {
        let text = match (abs.is_nan(), upper) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        field(out, r, false, &[sign], &|w: &mut dyn Emit| w.write_str(text));
        return;
    }

    let alt = r.flags.alt;
    let precision = r.precision.unwrap_or(6);
    match conv.to_ascii_lowercase() {
        'f' => field(out, r, true, &[sign], &|w: &mut dyn Emit| {
            fixed_notation(w, abs, precision, alt)
        }),
        'e' => field(out, r, true, &[sign], &|w: &mut dyn Emit| {
            exp_notation(w, abs, precision, alt, upper)
        }),
        'g' => field(out, r, true, &[sign], &|w: &mut dyn Emit| {
            general_notation(w, abs, precision, alt, upper)
        }),
        _ => {
            let base = if upper { "0X" } else { "0x" };
            field(out, r, true, &[sign, base], &|w: &mut dyn Emit| {
                hex_notation(w, abs, r.precision, alt, upper)
            })
        }
    }
}

/// Every finite f64 has run out of nonzero decimal digits by this many
/// places. Longer precisions are padded with zeros; `core::fmt` rejects
/// precisions above `u16::MAX`.
const EXACT_DIGITS: usize = 1100;

fn fixed_notation(w: &mut dyn Emit, v: f64, precision: usize, alt: bool) -> fmt::Result {
    let exact = precision.min(EXACT_DIGITS);
    write!(w, "{v:.exact$}")?;
    w.repeat(b'0', precision - exact);
    if alt && precision == 0 {
        w.write_char('.')?;
    }
    Ok(())
}

/// Passes the mantissa of Rust's `1.5e3` form through and keeps the
/// exponent
struct Mantissa<'w, W: ?Sized> {
    inner: &'w mut W,
    in_exponent: bool,
    negative: bool,
    exponent: i32,
}

impl<W: Write + ?Sized> Write for Mantissa<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let (mantissa, exponent) = if self.in_exponent {
            ("", s)
        } else if let Some((m, e)) = s.split_once('e') {
            self.in_exponent = true;
            (m, e)
        } else {
            (s, "")
        };
        self.inner.write_str(mantissa)?;
        for c in exponent.chars() {
            match c.to_digit(10) {
                Some(d) => self.exponent = self.exponent * 10 + d as i32,
                None => self.negative |= c == '-',
            }
        }
        Ok(())
    }
}

/// Write the `d.ddd` mantissa of `v` and return its decimal exponent
fn write_mantissa<W: Write + ?Sized>(
    w: &mut W,
    v: f64,
    precision: usize,
) -> Result<i32, fmt::Error> {
    let mut m = Mantissa {
        inner: w,
        in_exponent: false,
        negative: false,
        exponent: 0,
    };
    write!(m, "{v:.precision$e}")?;
    Ok(if m.negative { -m.exponent } else { m.exponent })
}

fn write_exponent(w: &mut dyn Emit, exp: i32, upper: bool) -> fmt::Result {
    let e = if upper { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    write!(w, "{e}{sign}{:02}", exp.unsigned_abs())
}

fn exp_notation(w: &mut dyn Emit, v: f64, precision: usize, alt: bool, upper: bool) -> fmt::Result {
    let exact = precision.min(EXACT_DIGITS);
    let exp = write_mantissa(w, v, exact)?;
    w.repeat(b'0', precision - exact);
    if alt && precision == 0 {
        w.write_char('.')?;
    }
    write_exponent(w, exp, upper)
}

/// Drops trailing fractional zeros, and the point if nothing follows it.
/// Whatever is still held back when the writer is dropped is discarded.
struct TrimZeros<'w, W: ?Sized> {
    inner: &'w mut W,
    after_point: bool,
    point: bool,
    zeros: usize,
}

impl<'w, W: Write + ?Sized> TrimZeros<'w, W> {
    fn new(inner: &'w mut W) -> Self {
        Self {
            inner,
            after_point: false,
            point: false,
            zeros: 0,
        }
    }
}

impl<W: Write + ?Sized> Write for TrimZeros<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            match c {
                '.' => {
                    self.after_point = true;
                    self.point = true;
                }
                '0' if self.after_point => self.zeros += 1,
                _ => {
                    if self.point {
                        self.inner.write_char('.')?;
                        self.point = false;
                    }
                    for _ in 0..self.zeros {
                        self.inner.write_char('0')?;
                    }
                    self.zeros = 0;
                    self.inner.write_char(c)?;
                }
            }
        }
        Ok(())
    }
}

fn general_notation(
    w: &mut dyn Emit,
    v: f64,
    precision: usize,
    alt: bool,
    upper: bool,
) -> fmt::Result {
    let p = precision.max(1);
    let exp = if v == 0.0 {
        0
    } else {
        write_mantissa(&mut Counter(0), v, (p - 1).min(EXACT_DIGITS))?
    };

    if exp >= -4 && (exp < 0 || (exp as usize) < p) {
        let precision = if exp >= 0 {
            p - 1 - exp as usize
        } else {
            (p - 1).saturating_add(exp.unsigned_abs() as usize)
        };
        if alt {
            return fixed_notation(w, v, precision, true);
        }
        // Zeros past the exact digits would be trimmed anyway
        let exact = precision.min(EXACT_DIGITS);
        write!(TrimZeros::new(w), "{v:.exact$}")
    } else {
        if alt {
            return exp_notation(w, v, p - 1, true, upper);
        }
        let exp = write_mantissa(&mut TrimZeros::new(&mut *w), v, (p - 1).min(EXACT_DIGITS))?;
        write_exponent(w, exp, upper)
    }
}

/// Hexadecimal mantissa and binary exponent, without the `0x` prefix
fn hex_notation(
    w: &mut dyn Emit,
    v: f64,
    precision: Option<usize>,
    alt: bool,
    upper: bool,
) -> fmt::Result {
    const MANT_BITS: u32 = 52;
    const NIBBLES: usize = 13;

    let bits = v.to_bits();
    let exp_bits = ((bits >> MANT_BITS) & 0x7FF) as i32;
    let mut mant = bits & ((1u64 << MANT_BITS) - 1);
    let (mut lead, exp) = match (v == 0.0, exp_bits) {
        (true, _) => (0u64, 0),
        (false, 0) => (0, -1022),
        _ => (1, exp_bits - 1023),
    };

    let (nibbles, extra) = match precision {
        Some(p) if p < NIBBLES => {
            // Round half to even at the requested nibble
            let shift = (NIBBLES - p) as u32 * 4;
            let full = (lead << MANT_BITS) | mant;
            let rem = full & ((1u64 << shift) - 1);
            let half = 1u64 << (shift - 1);
            let mut kept = full >> shift;
            if rem > half || (rem == half && kept & 1 == 1) {
                kept += 1;
            }
            let frac_bits = p as u32 * 4;
            lead = kept >> frac_bits;
            mant = kept & ((1u64 << frac_bits) - 1);
            (p, 0)
        }
        Some(p) => (NIBBLES, p - NIBBLES),
        None => {
            let mut n = NIBBLES;
            while n > 0 && mant & 0xF == 0 {
                mant >>= 4;
                n -= 1;
            }
            (n, 0)
        }
    };

    if upper {
        write!(w, "{lead:X}")?;
    } else {
        write!(w, "{lead:x}")?;
    }
    if nibbles + extra > 0 || alt {
        w.write_char('.')?;
    }
    if nibbles > 0 {
        if upper {
            write!(w, "{mant:0nibbles$X}")?;
        } else {
            write!(w, "{mant:0nibbles$x}")?;
        }
    }
    w.repeat(b'0', extra);
    let p = if upper { 'P' } else { 'p' };
    let sign = if exp < 0 { '-' } else { '+' };
    write!(w, "{p}{sign}{}", exp.unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: &str, args: &[Arg<'_>]) -> String {
        let mut buf = [0xAAu8; 128];
        let n = vsprintf(&mut buf, format, args).expect("fits");
        assert_eq!(buf[n], 0, "terminated");
        String::from_utf8(buf[..n].to_vec()).expect("utf8")
    }

    #[test]
    fn test_integer_writes_terminator() {
        let mut buf = [0xFFu8; 8];
        let n = sprintf!(&mut buf, "%d", 42).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..3], b"42\0");
    }

    #[test]
    fn test_float_default_precision() {
        assert_eq!(fmt("%f", &[Arg::Float(1.5)]), "1.500000");
        assert_eq!(fmt("%lf", &[Arg::Double(1.5)]), "1.500000");
        assert_eq!(fmt("%f", &[Arg::Double(1.5)]), "1.500000");
    }

    #[test]
    fn test_double_narrowed_without_length() {
        assert_eq!(fmt("%.10f", &[Arg::Double(0.1)]), "0.1000000015");
        assert_eq!(fmt("%.10lf", &[Arg::Double(0.1)]), "0.1000000000");
        assert_eq!(fmt("%.10Lf", &[Arg::Double(0.1)]), "0.1000000000");
        // A float stays a float even with 'l'
        assert_eq!(fmt("%.10lf", &[Arg::Float(0.1)]), "0.1000000015");
    }

    #[test]
    fn test_integer_flags_and_width() {
        assert_eq!(fmt("[%5d]", &[Arg::Int(42)]), "[   42]");
        assert_eq!(fmt("[%-5d]", &[Arg::Int(42)]), "[42   ]");
        assert_eq!(fmt("%+05d", &[Arg::Int(42)]), "+0042");
        assert_eq!(fmt("% d", &[Arg::Int(7)]), " 7");
        assert_eq!(fmt("%05d", &[Arg::Int(-42)]), "-0042");
        assert_eq!(fmt("%.4d", &[Arg::Int(-7)]), "-0007");
        assert_eq!(fmt("%08.3d", &[Arg::Int(5)]), "     005");
        assert_eq!(fmt("[%.0d]", &[Arg::Int(0)]), "[]");
    }

    #[test]
    fn test_radix_conversions() {
        assert_eq!(fmt("%x %X %o", &[Arg::Int(255), Arg::Int(255), Arg::Int(8)]), "ff FF 10");
        assert_eq!(fmt("%#x %#X %#o", &[Arg::Int(255), Arg::Int(255), Arg::Int(8)]), "0xff 0XFF 010");
        assert_eq!(fmt("%#x %#o", &[Arg::Int(0), Arg::Int(0)]), "0 0");
        assert_eq!(fmt("%#06x", &[Arg::Int(0x1F)]), "0x001f");
        assert_eq!(fmt("%04X", &[Arg::Uint(0xFFFF)]), "FFFF");
    }

    #[test]
    fn test_length_modifiers_follow_32_bit_target() {
        assert_eq!(fmt("%u", &[Arg::Int(-1)]), "4294967295");
        assert_eq!(fmt("%lu", &[Arg::Int(-1)]), "4294967295");
        assert_eq!(fmt("%llu", &[Arg::Int(-1)]), "18446744073709551615");
        assert_eq!(fmt("%lld", &[Arg::Int(-5_000_000_000)]), "-5000000000");
        assert_eq!(fmt("%hhd", &[Arg::Int(200)]), "-56");
        assert_eq!(fmt("%hx", &[Arg::Int(0x12345)]), "2345");
        assert_eq!(fmt("%zd", &[Arg::Int(3)]), "3");
    }

    #[test]
    fn test_star_width_and_precision() {
        assert_eq!(fmt("%*d", &[Arg::Int(5), Arg::Int(42)]), "   42");
        assert_eq!(fmt("%*d|", &[Arg::Int(-4), Arg::Int(42)]), "42  |");
        assert_eq!(fmt("%.*f", &[Arg::Int(2), Arg::Float(3.14159)]), "3.14");
        assert_eq!(fmt("%.*d", &[Arg::Int(-1), Arg::Int(9)]), "9");
    }

    #[test]
    fn test_strings_and_chars() {
        assert_eq!(fmt("%s!", &[Arg::Str("hi")]), "hi!");
        assert_eq!(fmt("%.3s", &[Arg::Str("hello")]), "hel");
        assert_eq!(fmt("[%-4s]", &[Arg::Str("ab")]), "[ab  ]");
        assert_eq!(fmt("%c%c", &[Arg::Char(b'o'), Arg::Int(107)]), "ok");
        assert_eq!(fmt("%lc%ls", &[Arg::Char(b'x'), Arg::Str("y")]), "xy");
        assert_eq!(fmt("100%%", &[]), "100%");
    }

    #[test]
    fn test_pointers() {
        assert_eq!(fmt("%p", &[Arg::Ptr(0x1234)]), "0x1234");
        assert_eq!(fmt("%p", &[Arg::Ptr(0)]), "(nil)");
    }

    #[test]
    fn test_exponent_notation() {
        assert_eq!(fmt("%le", &[Arg::Double(12345.678)]), "1.234568e+04");
        assert_eq!(fmt("%E", &[Arg::Float(0.00025)]), "2.500000E-04");
        assert_eq!(fmt("%.0e", &[Arg::Float(5.0)]), "5e+00");
        assert_eq!(fmt("%#.0e", &[Arg::Float(5.0)]), "5.e+00");
        assert_eq!(fmt("%.2le", &[Arg::Double(1e100)]), "1.00e+100");
    }

    #[test]
    fn test_general_notation() {
        assert_eq!(fmt("%g", &[Arg::Float(100.0)]), "100");
        assert_eq!(fmt("%g", &[Arg::Float(0.0001)]), "0.0001");
        assert_eq!(fmt("%lg", &[Arg::Double(123456789.0)]), "1.23457e+08");
        assert_eq!(fmt("%g", &[Arg::Float(1.5)]), "1.5");
        assert_eq!(fmt("%g", &[Arg::Float(0.0)]), "0");
        assert_eq!(fmt("%#g", &[Arg::Float(1.5)]), "1.50000");
        assert_eq!(fmt("%G", &[Arg::Double(1e-10)]), "1E-10");
    }

    #[test]
    fn test_hex_float() {
        assert_eq!(fmt("%a", &[Arg::Float(1.0)]), "0x1p+0");
        assert_eq!(fmt("%a", &[Arg::Float(1.5)]), "0x1.8p+0");
        assert_eq!(fmt("%A", &[Arg::Float(-0.5)]), "-0X1P-1");
        assert_eq!(fmt("%a", &[Arg::Float(0.0)]), "0x0p+0");
        assert_eq!(fmt("%.2a", &[Arg::Float(1.0)]), "0x1.00p+0");
        assert_eq!(fmt("%.0a", &[Arg::Float(1.5)]), "0x2p+0");
    }

    #[test]
    fn test_every_conversion_into_small_buffer() {
        let args = [
            Arg::Int(-12),
            Arg::Uint(12),
            Arg::Int(8),
            Arg::Int(255),
            Arg::Char(b'z'),
            Arg::Str("ok"),
            Arg::Ptr(0xbeef),
            Arg::Float(2.5),
            Arg::Float(0.25),
            Arg::Float(1e-5),
            Arg::Float(1.0),
        ];
        let format = "%d|%u|%o|%x|%c|%s|%p|%e|%f|%g|%a|%%";
        let expected: &[u8] = b"-12|12|10|ff|z|ok|0xbeef|2.500000e+00|0.250000|1e-05|0x1p+0|%";

        let mut buf = [0xAAu8; 64];
        let n = vsprintf(&mut buf, format, &args).unwrap();
        assert_eq!(&buf[..n], expected);
        assert_eq!(buf[n], 0);

        let mut small = [0xAAu8; 8];
        assert_eq!(
            vsprintf(&mut small, format, &args).unwrap_err(),
            FormatError::Overflow { needed: expected.len() + 1, capacity: 8 }
        );
        assert_eq!(&small, b"-12|12|\0");
    }

    #[test]
    fn test_huge_float_precision_pads_with_zeros() {
        let mut buf = [0xAAu8; 16];
        assert_eq!(
            vsprintf(&mut buf, "%.70000f", &[Arg::Float(1.5)]).unwrap_err(),
            FormatError::Overflow { needed: 70_003, capacity: 16 }
        );
        assert_eq!(&buf, b"1.5000000000000\0");

        let mut buf = [0xAAu8; 16];
        assert_eq!(
            vsprintf(&mut buf, "%.*e", &[Arg::Int(70_000), Arg::Float(1.5)]).unwrap_err(),
            FormatError::Overflow { needed: 70_007, capacity: 16 }
        );
        assert_eq!(&buf, b"1.5000000000000\0");

        assert_eq!(fmt("%.70000g", &[Arg::Float(1.5)]), "1.5");
        assert_eq!(
            sprintf!(&mut [0u8; 16], "%#.70000g", 1.5f32).unwrap_err(),
            FormatError::Overflow { needed: 70_002, capacity: 16 }
        );
    }

    #[test]
    fn test_long_precision_keeps_exact_digits() {
        // The smallest subnormal has 1074 fractional digits
        let tiny = f64::from_bits(1);
        let mut buf = vec![0u8; 1200];
        let n = sprintf!(&mut buf, "%.1110lf", tiny).unwrap();
        assert_eq!(&buf[..n], format!("{tiny:.1110}").as_bytes());

        let n = sprintf!(&mut buf, "%.1150le", 0.1f64).unwrap();
        let exact = format!("{:.1100e}", 0.1f64);
        let (mantissa, _) = exact.split_once('e').unwrap();
        let expected = format!("{mantissa}{}e-01", "0".repeat(50));
        assert_eq!(&buf[..n], expected.as_bytes());
    }

    #[test]
    fn test_huge_integer_padding_is_counted() {
        let mut buf = [0xAAu8; 16];
        assert_eq!(
            sprintf!(&mut buf, "%.2000000000d", 7).unwrap_err(),
            FormatError::Overflow { needed: 2_000_000_001, capacity: 16 }
        );
        assert_eq!(&buf, b"000000000000000\0");

        let mut buf = [0xAAu8; 16];
        assert_eq!(
            sprintf!(&mut buf, "%2000000000d|", 7).unwrap_err(),
            FormatError::Overflow { needed: 2_000_000_002, capacity: 16 }
        );
        assert_eq!(&buf, b"               \0");
    }

    #[test]
    fn test_octal_alternate_form() {
        assert_eq!(fmt("%#.3o", &[Arg::Int(8)]), "010");
        assert_eq!(fmt("%#.0o", &[Arg::Int(0)]), "0");
        assert_eq!(fmt("%#5o", &[Arg::Int(8)]), "  010");
    }

    #[test]
    fn test_float_specials() {
        assert_eq!(fmt("%f", &[Arg::Float(f32::INFINITY)]), "inf");
        assert_eq!(fmt("%F", &[Arg::Float(f32::NEG_INFINITY)]), "-INF");
        assert_eq!(fmt("%05f", &[Arg::Float(f32::NAN)]), "  nan");
        assert_eq!(fmt("%f", &[Arg::Float(-0.0)]), "-0.000000");
        assert_eq!(fmt("%08.2f", &[Arg::Float(-3.5)]), "-0003.50");
        assert_eq!(fmt("%#.0f", &[Arg::Float(3.0)]), "3.");
    }

    #[test]
    fn test_count_conversion() {
        let count = Cell::new(-1);
        let n = sprintf!(&mut [0u8; 16], "abc%n%d", &count, 5).unwrap();
        assert_eq!(n, 4);
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_overflow_truncates_and_terminates() {
        let mut buf = [0xAAu8; 4];
        let err = sprintf!(&mut buf, "hello").unwrap_err();
        assert_eq!(err, FormatError::Overflow { needed: 6, capacity: 4 });
        assert_eq!(&buf, b"hel\0");

        let mut empty: [u8; 0] = [];
        assert_eq!(
            sprintf!(&mut empty, "x").unwrap_err(),
            FormatError::Overflow { needed: 2, capacity: 0 }
        );

        let mut exact = [0xAAu8; 3];
        assert_eq!(sprintf!(&mut exact, "%s", "ab"), Ok(2));
        assert_eq!(&exact, b"ab\0");
    }

    #[test]
    fn test_argument_errors() {
        let mut buf = [0u8; 16];
        assert_eq!(
            sprintf!(&mut buf, "%d %d", 1).unwrap_err(),
            FormatError::MissingArgument { index: 1 }
        );
        assert_eq!(
            sprintf!(&mut buf, "%s", 1).unwrap_err(),
            FormatError::ArgumentType { index: 0, conversion: 's' }
        );
        assert_eq!(
            sprintf!(&mut buf, "%d", 1.0f32).unwrap_err(),
            FormatError::ArgumentType { index: 0, conversion: 'd' }
        );
        assert_eq!(
            sprintf!(&mut buf, "%f", "x").unwrap_err(),
            FormatError::ArgumentType { index: 0, conversion: 'f' }
        );
    }

    #[test]
    fn test_malformed_format() {
        let mut buf = [0u8; 16];
        assert_eq!(sprintf!(&mut buf, "%y").unwrap_err(), FormatError::UnknownConversion('y'));
        assert_eq!(sprintf!(&mut buf, "%-08.3q").unwrap_err(), FormatError::UnknownConversion('q'));
        assert_eq!(sprintf!(&mut buf, "abc%-").unwrap_err(), FormatError::Incomplete);
        assert_eq!(sprintf!(&mut buf, "%").unwrap_err(), FormatError::Incomplete);
    }

    #[test]
    fn test_parse_conversion_spec() {
        let (rest, spec) = conversion("%-+#012.5llx tail").unwrap();
        assert_eq!(rest, " tail");
        assert_eq!(spec.width, Some(Count::Fixed(12)));
        assert_eq!(spec.precision, Some(Count::Fixed(5)));
        assert_eq!(spec.length, Length::LongLong);
        assert_eq!(spec.conversion, 'x');
        assert!(spec.flags.left && spec.flags.plus && spec.flags.alt && spec.flags.zero);
        assert!(!spec.flags.space);

        let (_, spec) = conversion("%.f").unwrap();
        assert_eq!(spec.precision, Some(Count::Fixed(0)));
    }
}
