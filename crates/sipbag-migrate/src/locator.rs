use std::path::{Component, Path};

use sipbag_manifest::NodeKind;

use crate::error::{MigrateError, MigrateResult};

/// Destination for a package of `kind` created under `parent`.
///
/// `<base>/[<parent>/]package/<KIND>-sip`, where a trailing `/` on `base`
/// is not doubled.
pub fn target_locator(base: &str, parent: Option<&str>, kind: NodeKind) -> String {
    let base = base.trim_end_matches('/');
    let tail = format!("package/{}-sip", kind.type_text());
    match parent {
        Some(parent) => format!("{base}/{parent}/{tail}"),
        None => format!("{base}/{tail}"),
    }
}

/// Scratch-directory name of the package for `id`.
///
/// The name must be a single normal path component, so `.`, `..`, empty
/// names, and backslashes are rejected.
pub fn package_name(id: &str) -> MigrateResult<String> {
    let name = id.replace('/', "-");
    let mut components = Path::new(&name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || name.contains('\\') || name.chars().any(char::is_control) {
        return Err(MigrateError::InvalidIdentifier(id.to_string()));
    }
    Ok(name)
}
