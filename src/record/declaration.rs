use super::{DataType, Structure};

/// Commands declaring a record named `name` with the given structure.
///
/// ```text
/// record request (
/// 1 name = vc
/// 1 items [*]
/// 2 id = f8
/// ) go
/// ```
pub fn declaration_commands(name: &str, structure: &Structure) -> Vec<String> {
    let mut lines = vec![format!("record {} (", name.trim().to_ascii_lowercase())];
    declare_fields(structure, 1, &mut lines);
    lines.push(") go".to_string());
    vec![lines.join("\n")]
}

fn declare_fields(structure: &Structure, level: usize, lines: &mut Vec<String>) {
    for field in structure.fields() {
        let name = field.name().to_ascii_lowercase();
        match field.data_type() {
            DataType::Record => lines.push(format!("{level} {name}")),
            DataType::List(size) => lines.push(format!("{level} {name} [{size}]")),
            DataType::DynamicList => lines.push(format!("{level} {name} [*]")),
            scalar => {
                lines.push(format!("{level} {name} = {scalar}"));
                continue;
            }
        }
        if let Some(child) = field.structure() {
            declare_fields(child, level + 1, lines);
        }
    }
}
