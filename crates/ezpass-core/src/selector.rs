//! Selector synthesis: derive a replayable locator for an input element.

use tracing::warn;

use ezpass_protocols::{Element, ElementRef, FieldLocator, PathSegment};

/// Derive a locator for `element`.
///
/// First match wins: `name` attribute, `id` attribute, the generic
/// password-input locator for `type=password`, then a structural path from
/// the body down to the element. Returns `None` for non-input elements.
pub fn synthesize(element: &dyn Element) -> Option<FieldLocator> {
    if !element.is_input() {
        warn!("Target is not an input element: <{}>", element.tag_name());
        return None;
    }

    if let Some(name) = non_empty(element.attribute("name")) {
        return Some(FieldLocator::by_name(&name));
    }
    if let Some(id) = non_empty(element.attribute("id")) {
        return Some(FieldLocator::by_id(&id));
    }
    if element.input_type() == "password" {
        return Some(FieldLocator::password_input());
    }

    let mut path = vec![segment(element)];
    let mut current = element.parent();
    while let Some(node) = current {
        if node.is_body() {
            break;
        }
        path.push(segment(node.as_ref()));
        current = node.parent();
    }
    path.reverse();
    Some(FieldLocator::structural(&path))
}

/// Walk from a drop target up to the nearest input element, stopping at the
/// body.
pub fn nearest_input(target: ElementRef) -> Option<ElementRef> {
    let mut current = Some(target);
    while let Some(node) = current {
        if node.is_input() {
            return Some(node);
        }
        if node.is_body() {
            return None;
        }
        current = node.parent();
    }
    None
}

fn segment(element: &dyn Element) -> PathSegment {
    let classes = element
        .class_list()
        .into_iter()
        .filter(|c| !c.is_empty())
        .collect();
    PathSegment::new(element.tag_name(), classes)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
