//! Loader for library data files.
//!
//! A library data document is an XML file whose root holds
//! `<LibraryFunction>`, `<SupportedEventHandler>`, and `<LibraryConstant>`
//! elements. Every element names the subsets it belongs to; the provider
//! filters on those at query time.

use crate::stdlib::{
    is_valid_identifier, is_valid_subset_name, normalize_value_string, ConstantSig, EventSig, FunctionSig, ParamSig,
};
use crate::ty::LslType;
use std::collections::BTreeSet;
use std::fmt;

/// The raw signature collections read from one document.
#[derive(Debug, Default)]
pub struct LibraryData {
    pub functions: Vec<FunctionSig>,
    pub events: Vec<EventSig>,
    pub constants: Vec<ConstantSig>,
}

/// A problem in a library data document, with the 1-based position of the
/// offending element.
#[derive(Debug)]
pub enum LibraryDataError {
    Xml(roxmltree::Error),
    MissingAttribute { element: String, attribute: String, line: u32, col: u32 },
    InvalidName { name: String, line: u32, col: u32 },
    InvalidType { value: String, line: u32, col: u32 },
    InvalidSubsetName { name: String, line: u32, col: u32 },
    InvalidValueString { name: String, reason: String, line: u32, col: u32 },
    DuplicateParameterName { name: String, line: u32, col: u32 },
    VariadicParameterNotLast { function: String, line: u32, col: u32 },
    VoidParameter { name: String, line: u32, col: u32 },
}

impl fmt::Display for LibraryDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LibraryDataError::*;
        match self {
            Xml(e) => write!(f, "malformed library data document: {}", e),
            MissingAttribute { element, attribute, line, col } => {
                write!(f, "{}:{}: <{}> is missing the required attribute `{}`", line, col, element, attribute)
            }
            InvalidName { name, line, col } => write!(f, "{}:{}: `{}` is not a valid identifier", line, col, name),
            InvalidType { value, line, col } => write!(f, "{}:{}: `{}` is not a valid type name", line, col, value),
            InvalidSubsetName { name, line, col } => {
                write!(f, "{}:{}: `{}` is not a valid subset name", line, col, name)
            }
            InvalidValueString { name, reason, line, col } => {
                write!(f, "{}:{}: constant `{}` has an invalid value string: {}", line, col, name, reason)
            }
            DuplicateParameterName { name, line, col } => {
                write!(f, "{}:{}: parameter name `{}` appears twice", line, col, name)
            }
            VariadicParameterNotLast { function, line, col } => {
                write!(f, "{}:{}: function `{}` has a variadic parameter before the end", line, col, function)
            }
            VoidParameter { name, line, col } => {
                write!(f, "{}:{}: parameter `{}` cannot have type void", line, col, name)
            }
        }
    }
}

impl std::error::Error for LibraryDataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LibraryDataError::Xml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<roxmltree::Error> for LibraryDataError {
    fn from(e: roxmltree::Error) -> Self {
        LibraryDataError::Xml(e)
    }
}

pub fn parse_library_data(source: &str) -> Result<LibraryData, LibraryDataError> {
    let doc = roxmltree::Document::parse(source)?;
    let mut data = LibraryData::default();

    for node in doc.root_element().children().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "LibraryFunction" => data.functions.push(parse_function(&doc, node)?),
            "SupportedEventHandler" => data.events.push(parse_event(&doc, node)?),
            "LibraryConstant" => data.constants.push(parse_constant(&doc, node)?),
            _ => {} // unknown elements are ignored for forward compatibility
        }
    }
    Ok(data)
}

fn pos_of(doc: &roxmltree::Document<'_>, node: roxmltree::Node<'_, '_>) -> (u32, u32) {
    let pos = doc.text_pos_at(node.range().start);
    (pos.row, pos.col)
}

fn required_attr<'a>(
    doc: &roxmltree::Document<'_>,
    node: roxmltree::Node<'a, '_>,
    name: &str,
) -> Result<&'a str, LibraryDataError> {
    node.attribute(name).ok_or_else(|| {
        let (line, col) = pos_of(doc, node);
        LibraryDataError::MissingAttribute {
            element: node.tag_name().name().to_string(),
            attribute: name.to_string(),
            line,
            col,
        }
    })
}

fn parse_name(doc: &roxmltree::Document<'_>, node: roxmltree::Node<'_, '_>) -> Result<String, LibraryDataError> {
    let name = required_attr(doc, node, "Name")?;
    if !is_valid_identifier(name) {
        let (line, col) = pos_of(doc, node);
        return Err(LibraryDataError::InvalidName { name: name.to_string(), line, col });
    }
    Ok(name.to_string())
}

fn parse_subsets(
    doc: &roxmltree::Document<'_>,
    node: roxmltree::Node<'_, '_>,
) -> Result<BTreeSet<String>, LibraryDataError> {
    let raw = required_attr(doc, node, "Subsets")?;
    let mut subsets = BTreeSet::new();
    for part in raw.split(',') {
        let part = part.trim();
        if !is_valid_subset_name(part) {
            let (line, col) = pos_of(doc, node);
            return Err(LibraryDataError::InvalidSubsetName { name: part.to_string(), line, col });
        }
        subsets.insert(part.to_string());
    }
    Ok(subsets)
}

fn parse_type(
    doc: &roxmltree::Document<'_>,
    node: roxmltree::Node<'_, '_>,
    value: &str,
    allow_void: bool,
) -> Result<LslType, LibraryDataError> {
    if allow_void && value.eq_ignore_ascii_case("void") {
        return Ok(LslType::Void);
    }
    LslType::from_type_name(value).ok_or_else(|| {
        let (line, col) = pos_of(doc, node);
        LibraryDataError::InvalidType { value: value.to_string(), line, col }
    })
}

fn parse_params(
    doc: &roxmltree::Document<'_>,
    node: roxmltree::Node<'_, '_>,
    owner: &str,
    allow_variadic: bool,
) -> Result<Vec<ParamSig>, LibraryDataError> {
    let mut params: Vec<ParamSig> = Vec::new();
    for child in node.children().filter(|n| n.is_element() && n.tag_name().name() == "Parameter") {
        let (line, col) = pos_of(doc, child);
        if params.last().map_or(false, |p| p.variadic) {
            return Err(LibraryDataError::VariadicParameterNotLast { function: owner.to_string(), line, col });
        }
        let name = parse_name(doc, child)?;
        if params.iter().any(|p| p.name == name) {
            return Err(LibraryDataError::DuplicateParameterName { name, line, col });
        }
        let type_str = required_attr(doc, child, "Type")?;
        let variadic = allow_variadic && child.attribute("Variadic").map_or(false, |v| v.eq_ignore_ascii_case("true"));
        // void is only meaningful as the "anything goes" variadic tail
        let ty = parse_type(doc, child, type_str, variadic)?;
        if ty == LslType::Void && !variadic {
            return Err(LibraryDataError::VoidParameter { name, line, col });
        }
        params.push(ParamSig { name, ty, variadic });
    }
    Ok(params)
}

fn property_flag(node: roxmltree::Node<'_, '_>, name: &str) -> bool {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "Property")
        .any(|p| p.attribute("Name") == Some(name) && p.attribute("Value").map_or(false, |v| v.eq_ignore_ascii_case("true")))
}

fn documentation(node: roxmltree::Node<'_, '_>) -> Option<String> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "DocumentationString")
        .filter_map(|d| d.text())
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
}

fn parse_function(
    doc: &roxmltree::Document<'_>,
    node: roxmltree::Node<'_, '_>,
) -> Result<FunctionSig, LibraryDataError> {
    let name = parse_name(doc, node)?;
    let return_str = required_attr(doc, node, "ReturnType")?;
    let return_ty = parse_type(doc, node, return_str, true)?;
    let subsets = parse_subsets(doc, node)?;
    let params = parse_params(doc, node, &name, true)?;
    Ok(FunctionSig {
        name,
        return_ty,
        params,
        subsets,
        deprecated: property_flag(node, "Deprecated"),
        mod_invoke: property_flag(node, "ModInvoke"),
        doc: documentation(node),
    })
}

fn parse_event(doc: &roxmltree::Document<'_>, node: roxmltree::Node<'_, '_>) -> Result<EventSig, LibraryDataError> {
    let name = parse_name(doc, node)?;
    let subsets = parse_subsets(doc, node)?;
    let params = parse_params(doc, node, &name, false)?;
    Ok(EventSig { name, params, subsets, deprecated: property_flag(node, "Deprecated"), doc: documentation(node) })
}

fn parse_constant(
    doc: &roxmltree::Document<'_>,
    node: roxmltree::Node<'_, '_>,
) -> Result<ConstantSig, LibraryDataError> {
    let name = parse_name(doc, node)?;
    let type_str = required_attr(doc, node, "Type")?;
    let ty = parse_type(doc, node, type_str, false)?;
    let subsets = parse_subsets(doc, node)?;
    let raw_value = required_attr(doc, node, "Value")?;
    let value = normalize_value_string(ty, raw_value).map_err(|reason| {
        let (line, col) = pos_of(doc, node);
        LibraryDataError::InvalidValueString { name: name.clone(), reason, line, col }
    })?;
    Ok(ConstantSig {
        name,
        ty,
        value,
        subsets,
        deprecated: property_flag(node, "Deprecated"),
        expand: property_flag(node, "Expand"),
        doc: documentation(node),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_document() {
        let data = parse_library_data(
            r#"<LSLLibraryData>
                <LibraryFunction Name="llOwnerSay" ReturnType="void" Subsets="lsl,os-lsl">
                    <Parameter Name="message" Type="string"/>
                </LibraryFunction>
                <SupportedEventHandler Name="state_entry" Subsets="lsl,os-lsl"/>
                <LibraryConstant Name="TRUE" Type="integer" Value="true" Subsets="lsl,os-lsl"/>
            </LSLLibraryData>"#,
        )
        .unwrap();
        assert_eq!(data.functions.len(), 1);
        assert_eq!(data.functions[0].params.len(), 1);
        assert_eq!(data.events.len(), 1);
        assert_eq!(data.constants.len(), 1);
        assert_eq!(data.constants[0].value, "1");
    }

    #[test]
    fn missing_name_reports_position() {
        let err = parse_library_data(
            "<LSLLibraryData>\n  <LibraryConstant Type=\"integer\" Value=\"1\" Subsets=\"lsl\"/>\n</LSLLibraryData>",
        )
        .unwrap_err();
        match err {
            LibraryDataError::MissingAttribute { attribute, line, .. } => {
                assert_eq!(attribute, "Name");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn variadic_must_be_last() {
        let err = parse_library_data(
            r#"<LSLLibraryData>
                <LibraryFunction Name="f" ReturnType="void" Subsets="lsl">
                    <Parameter Name="a" Type="void" Variadic="true"/>
                    <Parameter Name="b" Type="integer"/>
                </LibraryFunction>
            </LSLLibraryData>"#,
        )
        .unwrap_err();
        assert!(matches!(err, LibraryDataError::VariadicParameterNotLast { .. }));
    }

    #[test]
    fn bad_subset_name_rejected() {
        let err = parse_library_data(
            r#"<LSLLibraryData>
                <LibraryConstant Name="X" Type="integer" Value="1" Subsets="no spaces"/>
            </LSLLibraryData>"#,
        )
        .unwrap_err();
        assert!(matches!(err, LibraryDataError::InvalidSubsetName { .. }));
    }
}
