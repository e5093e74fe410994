//! Library signature data: the built-in functions, events, and constants
//! scripts are validated against.
//!
//! Signatures are tagged with the named subsets they belong to (`lsl`,
//! `os-lsl`, `ossl`, ...). A provider answers lookups filtered by the
//! active subsets, either live (everything loaded, filtered per query) or
//! static (inactive signatures dropped at construction).

pub mod xml;

use crate::ty::LslType;
use lazy_static::lazy_static;
use std::collections::{BTreeSet, HashMap};

/// Subset names the embedded library data uses.
pub const KNOWN_SUBSETS: &[&str] =
    &["lsl", "os-lsl", "ossl", "os-lightshare", "os-bullet-physics", "os-mod-api", "os-json-store"];

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `[A-Za-z0-9\-_]+`
pub fn is_valid_subset_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// A library function or event parameter. `variadic` is only legal on the
/// final parameter; a variadic of `Void` accepts arguments of any type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSig {
    pub name: String,
    pub ty: LslType,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSig {
    pub name: String,
    pub return_ty: LslType,
    pub params: Vec<ParamSig>,
    pub subsets: BTreeSet<String>,
    pub deprecated: bool,
    /// Dispatched through OpenSim's `modInvoke` mechanism.
    pub mod_invoke: bool,
    pub doc: Option<String>,
}

impl FunctionSig {
    /// Number of parameters excluding a trailing variadic.
    pub fn concrete_param_count(&self) -> usize {
        self.params.iter().filter(|p| !p.variadic).count()
    }

    pub fn variadic_param(&self) -> Option<&ParamSig> {
        self.params.last().filter(|p| p.variadic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSig {
    pub name: String,
    pub params: Vec<ParamSig>,
    pub subsets: BTreeSet<String>,
    pub deprecated: bool,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantSig {
    pub name: String,
    /// Never `Void`.
    pub ty: LslType,
    /// The normalized value string, see [`normalize_value_string`].
    pub value: String,
    pub subsets: BTreeSet<String>,
    pub deprecated: bool,
    /// Expanded to its value rather than kept by name when code is re-emitted.
    pub expand: bool,
    pub doc: Option<String>,
}

/// Normalizes a constant's value string for its declared type, or explains
/// why it cannot be.
///
/// * Integer: decimal, hex, or `true`/`false` (folded to `1`/`0`); stored
///   as the decimal form of the 32-bit value.
/// * Float: a decimal with optional `f`/`d` suffix (stored stripped), or a
///   hex integer interpreted as an IEEE-754 bit pattern.
/// * Vector/Rotation: `<a,b,c[,d]>` or the bare CSV; stored as the bare CSV.
/// * List: `[...]` or the bare CSV of primitive or vector/rotation
///   literals; stored as the bare CSV.
/// * String/Key: stored verbatim.
pub fn normalize_value_string(ty: LslType, raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    match ty {
        LslType::Integer => normalize_integer(raw),
        LslType::Float => normalize_float(raw),
        LslType::Vector => normalize_tuple(raw, 3),
        LslType::Rotation => normalize_tuple(raw, 4),
        LslType::List => normalize_list(raw),
        LslType::String | LslType::Key => Ok(raw.to_string()),
        LslType::Void => Err("a constant cannot have type void".to_string()),
    }
}

fn normalize_integer(raw: &str) -> Result<String, String> {
    if raw.eq_ignore_ascii_case("true") {
        return Ok("1".to_string());
    }
    if raw.eq_ignore_ascii_case("false") {
        return Ok("0".to_string());
    }
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16)
            .map(|v| (v as i32).to_string())
            .map_err(|_| format!("`{}` is not a valid hex integer", raw));
    }
    raw.parse::<i64>()
        .map(|v| (v as i32).to_string())
        .map_err(|_| format!("`{}` is not a valid integer", raw))
}

fn normalize_float(raw: &str) -> Result<String, String> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16)
            .map(|bits| f32::from_bits(bits).to_string())
            .map_err(|_| format!("`{}` is not a valid hex float", raw));
    }
    let stripped = raw.strip_suffix(|c| c == 'f' || c == 'F' || c == 'd' || c == 'D').unwrap_or(raw);
    stripped
        .parse::<f64>()
        .map(|_| stripped.to_string())
        .map_err(|_| format!("`{}` is not a valid float", raw))
}

fn normalize_tuple(raw: &str, arity: usize) -> Result<String, String> {
    let inner = strip_delimiters(raw, '<', '>').unwrap_or(raw);
    let components: Vec<&str> = inner.split(',').map(str::trim).collect();
    if components.len() != arity {
        return Err(format!("expected {} components, found {}", arity, components.len()));
    }
    for c in &components {
        normalize_float(c).map_err(|_| format!("component `{}` is not a valid float", c))?;
    }
    Ok(components.join(", "))
}

fn normalize_list(raw: &str) -> Result<String, String> {
    let inner = strip_delimiters(raw, '[', ']').unwrap_or(raw).trim();
    if inner.is_empty() {
        return Ok(String::new());
    }
    let elements = split_top_level(inner);
    let mut normalized = Vec::with_capacity(elements.len());
    for e in &elements {
        let e = e.trim();
        let ok = (e.starts_with('"') && e.ends_with('"') && e.len() >= 2)
            || normalize_integer(e).is_ok()
            || normalize_float(e).is_ok()
            || normalize_tuple(e, 3).is_ok()
            || normalize_tuple(e, 4).is_ok();
        if !ok {
            return Err(format!("`{}` is not a valid list element", e));
        }
        normalized.push(e.to_string());
    }
    Ok(normalized.join(", "))
}

fn strip_delimiters(raw: &str, open: char, close: char) -> Option<&str> {
    let raw = raw.trim();
    if raw.starts_with(open) && raw.ends_with(close) && raw.len() >= 2 {
        Some(&raw[open.len_utf8()..raw.len() - close.len_utf8()])
    } else {
        None
    }
}

/// Splits on commas, ignoring those nested in `<>` tuples or string quotes.
fn split_top_level(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '<' if !in_string => depth += 1,
            '>' if !in_string => depth -= 1,
            ',' if !in_string && depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

/// How a provider applies its active-subset set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// All signatures stay loaded; flipping active subsets changes query
    /// results without rebuilding.
    Live,
    /// Signatures outside the active subsets are dropped at construction.
    Static,
}

/// A queryable store of library signatures, indexed by name.
#[derive(Debug, Clone)]
pub struct LibraryProvider {
    functions: HashMap<String, Vec<FunctionSig>>,
    events: HashMap<String, EventSig>,
    constants: HashMap<String, ConstantSig>,
    active: BTreeSet<String>,
    mode: FilterMode,
}

impl LibraryProvider {
    pub fn from_data(data: xml::LibraryData, active: &[&str], mode: FilterMode) -> LibraryProvider {
        let active: BTreeSet<String> = active.iter().map(|s| s.to_string()).collect();
        let keep = |subsets: &BTreeSet<String>| {
            mode == FilterMode::Live || subsets.iter().any(|s| active.contains(s))
        };
        let mut functions: HashMap<String, Vec<FunctionSig>> = HashMap::new();
        for f in data.functions.into_iter().filter(|f| keep(&f.subsets)) {
            functions.entry(f.name.clone()).or_default().push(f);
        }
        let mut events = HashMap::new();
        for e in data.events.into_iter().filter(|e| keep(&e.subsets)) {
            events.insert(e.name.clone(), e);
        }
        let mut constants = HashMap::new();
        for c in data.constants.into_iter().filter(|c| keep(&c.subsets)) {
            constants.insert(c.name.clone(), c);
        }
        log::debug!(
            "loaded library data: {} function name(s), {} event(s), {} constant(s)",
            functions.len(),
            events.len(),
            constants.len()
        );
        LibraryProvider { functions, events, constants, active, mode }
    }

    pub fn from_xml(source: &str, active: &[&str], mode: FilterMode) -> Result<LibraryProvider, xml::LibraryDataError> {
        Ok(LibraryProvider::from_data(xml::parse_library_data(source)?, active, mode))
    }

    /// The embedded default library, live-filtered.
    pub fn embedded(active: &[&str]) -> LibraryProvider {
        LibraryProvider::from_data(
            xml::LibraryData {
                functions: DEFAULT_LIBRARY.functions.clone(),
                events: DEFAULT_LIBRARY.events.clone(),
                constants: DEFAULT_LIBRARY.constants.clone(),
            },
            active,
            FilterMode::Live,
        )
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.mode
    }

    pub fn is_active_subset(&self, name: &str) -> bool {
        self.active.contains(name)
    }

    pub fn active_subsets(&self) -> impl Iterator<Item = &str> {
        self.active.iter().map(String::as_str)
    }

    /// Replaces the active-subset set. In static mode this can only narrow
    /// results further, since inactive signatures were never loaded.
    pub fn set_active_subsets<'a>(&mut self, subsets: impl IntoIterator<Item = &'a str>) {
        self.active = subsets.into_iter().map(|s| s.to_string()).collect();
    }

    fn visible(&self, subsets: &BTreeSet<String>) -> bool {
        subsets.iter().any(|s| self.active.contains(s))
    }

    /// All overloads of a library function visible in the active subsets.
    pub fn lookup_functions(&self, name: &str) -> Vec<&FunctionSig> {
        self.functions
            .get(name)
            .map(|sigs| sigs.iter().filter(|s| self.visible(&s.subsets)).collect())
            .unwrap_or_default()
    }

    pub fn lookup_event(&self, name: &str) -> Option<&EventSig> {
        self.events.get(name).filter(|e| self.visible(&e.subsets))
    }

    pub fn lookup_constant(&self, name: &str) -> Option<&ConstantSig> {
        self.constants.get(name).filter(|c| self.visible(&c.subsets))
    }

    /// Whether a name is taken by a library function or constant in the
    /// active subsets. User code may not shadow these.
    pub fn is_library_name(&self, name: &str) -> bool {
        !self.lookup_functions(name).is_empty() || self.lookup_constant(name).is_some()
    }
}

/// Outcome of picking among a function's visible overloads at a call site.
#[derive(Debug)]
pub enum OverloadResolution<'a> {
    Match(&'a FunctionSig),
    /// Multiple candidates are minimal under the componentwise rank order.
    Ambiguous(Vec<&'a FunctionSig>),
    NoMatch,
}

/// Ranks each candidate per argument (0 exact, 1 implicit conversion) and
/// picks the unique componentwise-minimal one if it exists.
pub fn resolve_overload<'a>(candidates: &[&'a FunctionSig], arg_types: &[LslType]) -> OverloadResolution<'a> {
    let ranked: Vec<(&'a FunctionSig, Vec<u8>)> =
        candidates.iter().filter_map(|sig| rank_call(sig, arg_types).map(|r| (*sig, r))).collect();
    if ranked.is_empty() {
        return OverloadResolution::NoMatch;
    }
    let minimal: Vec<&(&'a FunctionSig, Vec<u8>)> = ranked
        .iter()
        .filter(|(_, ranks)| !ranked.iter().any(|(_, other)| strictly_better(other, ranks)))
        .collect();
    match minimal.as_slice() {
        [(sig, _)] => OverloadResolution::Match(sig),
        several => OverloadResolution::Ambiguous(several.iter().map(|(sig, _)| *sig).collect()),
    }
}

fn rank_call(sig: &FunctionSig, arg_types: &[LslType]) -> Option<Vec<u8>> {
    let concrete = sig.concrete_param_count();
    match sig.variadic_param() {
        None if arg_types.len() != concrete => return None,
        Some(_) if arg_types.len() < concrete => return None,
        _ => {}
    }
    let mut ranks = Vec::with_capacity(arg_types.len());
    for (i, &arg) in arg_types.iter().enumerate() {
        let target = if i < concrete { sig.params[i].ty } else { sig.variadic_param()?.ty };
        let rank = if target == LslType::Void || arg == target {
            0
        } else if crate::ty::implicitly_convertible(arg, target) {
            1
        } else {
            return None;
        };
        ranks.push(rank);
    }
    Some(ranks)
}

/// `a` dominates `b`: no component worse, at least one strictly better.
fn strictly_better(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x <= y) && a.iter().zip(b).any(|(x, y)| x < y)
}

pub const DEFAULT_LIBRARY_XML: &str = include_str!("stdlib/default.xml");

lazy_static! {
    static ref DEFAULT_LIBRARY: xml::LibraryData =
        xml::parse_library_data(DEFAULT_LIBRARY_XML).expect("embedded library data is well-formed");
}
