//! Text views over a decoded [`ResourceTable`]: the full entry listing, the
//! `values` files a table would have been compiled from, and the physical
//! file paths it points into.
//!
//! Everything here is derived from the table's public read API.

use crate::android::table::{ConfigEntry, EntryValue, ResourceEntry, ResourceName, ResourceTable};
use crate::android::value::DecodedValue;
use quick_xml::escape::{escape, partial_escape};
use std::collections::BTreeMap;
use std::fmt::Write;

/// True when the entry's value is the path of a file packaged next to the
/// table (layouts, drawables, ...) rather than a value stored in it.
pub fn is_file_resource(name: &ResourceName, entry: &ResourceEntry) -> bool {
    matches!(entry.simple_value(), Some(DecodedValue::String(_))) && name.type_name != "string"
}

/// Where the entry lives in a source tree: the file itself for file
/// resources, otherwise `res/values[-qualifiers]/<type>s.xml`.
pub fn resource_file_path(table: &ResourceTable, name: &ResourceName, declared: &ConfigEntry) -> String {
    if is_file_resource(name, &declared.entry) {
        return data_string(table, declared);
    }
    let mut path = String::from("res/values");
    if !declared.config.is_default() {
        path.push('-');
        path.push_str(&declared.config.to_string());
    }
    path.push('/');
    path.push_str(&name.type_name);
    path.push_str("s.xml");
    path
}

/// The entry's value as it would appear in a values file.
pub fn data_string(table: &ResourceTable, declared: &ConfigEntry) -> String {
    match &declared.entry.value {
        EntryValue::Simple(value) => value_string(table, value),
        EntryValue::Bag(bag) => {
            let items: Vec<String> = bag
                .items
                .iter()
                .map(|item| format!("{}={}", item.key, value_string(table, &item.value)))
                .collect();
            format!("[{}]", items.join(", "))
        }
    }
}

fn value_string(table: &ResourceTable, value: &DecodedValue) -> String {
    match value {
        DecodedValue::Reference(id) => table
            .name_of(*id)
            .map(|name| name.resource_string())
            .unwrap_or_else(|| value.to_string()),
        DecodedValue::DynamicReference(id) => table
            .name_of(table.remap_dynamic(*id))
            .map(|name| name.resource_string())
            .unwrap_or_else(|| value.to_string()),
        DecodedValue::Attribute(id) | DecodedValue::DynamicAttribute(id) => table
            .name_of(*id)
            .map(|name| format!("?{}/{}", name.type_name, name.name))
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

/// One block per resource, one sub-block per configuration in declaration
/// order. Blocks are separated by an empty line.
pub fn entries_dump(table: &ResourceTable) -> String {
    let mut blocks = Vec::new();
    for (id, entries) in table.resources() {
        let Some(name) = table.name_of(id) else {
            continue;
        };
        let mut block = String::new();
        let _ = writeln!(block, "- resource {} 0x{:x}:", name.resource_string(), id.0);
        for declared in entries {
            let _ = writeln!(block, "    * configuration {}:", declared.config);
            let _ = writeln!(
                block,
                "      located under {}",
                resource_file_path(table, name, declared)
            );
            if !is_file_resource(name, &declared.entry) {
                let _ = writeln!(block, "        value {}", data_string(table, declared));
            }
        }
        blocks.push(block);
    }
    blocks.join("\n")
}

/// Non-file entries grouped by the values file they belong to.
pub fn values_by_path(table: &ResourceTable) -> BTreeMap<String, Vec<(&ResourceName, &ConfigEntry)>> {
    let mut grouped: BTreeMap<String, Vec<_>> = BTreeMap::new();
    for (id, entries) in table.resources() {
        let Some(name) = table.name_of(id) else {
            continue;
        };
        for declared in entries {
            if is_file_resource(name, &declared.entry) {
                continue;
            }
            grouped
                .entry(resource_file_path(table, name, declared))
                .or_default()
                .push((name, declared));
        }
    }
    grouped
}

/// Renders every values file as a `<resources>` document.
pub fn values_dump(table: &ResourceTable) -> BTreeMap<String, String> {
    values_by_path(table)
        .into_iter()
        .map(|(path, entries)| {
            let mut doc = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources>\n");
            for (name, declared) in entries {
                let data = data_string(table, declared);
                let _ = write!(
                    doc,
                    "    <item type=\"{}\" name=\"{}\"",
                    escape(name.type_name.as_str()),
                    escape(name.name.as_str())
                );
                // ids declared without a value
                if name.type_name == "id" && data == "false" {
                    doc.push_str("/>\n");
                } else {
                    let _ = writeln!(doc, ">{}</item>", partial_escape(data.as_str()));
                }
            }
            doc.push_str("</resources>\n");
            (path, doc)
        })
        .collect()
}

/// Paths of all file resources, in table order.
pub fn physical_file_paths(table: &ResourceTable) -> Vec<String> {
    let mut paths = Vec::new();
    for (id, entries) in table.resources() {
        let Some(name) = table.name_of(id) else {
            continue;
        };
        for declared in entries {
            if is_file_resource(name, &declared.entry) {
                paths.push(data_string(table, declared));
            }
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::config::{Configuration, DENSITY_HIGH};
    use crate::android::value::{TYPE_INT_BOOLEAN, TYPE_INT_COLOR_RGB8, TYPE_REFERENCE};
    use crate::tests::builder::{EntryData, PackageBuilder, TableBuilder, TypeLayout};

    fn sample() -> ResourceTable {
        let mut table = TableBuilder::new();
        let demo = table.string("Demo & co");
        let icon = table.string("res/drawable-hdpi/icon.png");
        let layout = table.string("res/layout/main.xml");

        let mut package = PackageBuilder::new(0x7f, "com.example");
        package.type_spec(1, "string", 1);
        package.type_spec(2, "drawable", 1);
        package.type_spec(3, "layout", 1);
        package.type_spec(4, "color", 2);
        package.type_spec(5, "id", 1);
        package.type_chunk(
            1,
            Configuration::default(),
            TypeLayout::Dense,
            vec![Some(EntryData::string("app_name", demo))],
        );
        let hdpi = Configuration {
            density: DENSITY_HIGH,
            ..Configuration::default()
        };
        package.type_chunk(2, hdpi, TypeLayout::Dense, vec![Some(EntryData::string("icon", icon))]);
        package.type_chunk(
            3,
            Configuration::default(),
            TypeLayout::Dense,
            vec![Some(EntryData::string("main", layout))],
        );
        package.type_chunk(
            4,
            Configuration::default(),
            TypeLayout::Dense,
            vec![
                Some(EntryData::value("accent", TYPE_INT_COLOR_RGB8, 0x00ff_8800)),
                Some(EntryData::value("accent_alias", TYPE_REFERENCE, 0x7f04_0000)),
            ],
        );
        package.type_chunk(
            5,
            Configuration::default(),
            TypeLayout::Dense,
            vec![Some(EntryData::value("button", TYPE_INT_BOOLEAN, 0))],
        );
        table.package(package);
        ResourceTable::parse(&table.to_bytes()).unwrap()
    }

    #[test]
    fn entries_dump_lists_every_configuration() {
        let dump = entries_dump(&sample());
        let expected = "\
- resource @string/app_name 0x7f010000:
    * configuration default:
      located under res/values/strings.xml
        value Demo & co

- resource @drawable/icon 0x7f020000:
    * configuration hdpi:
      located under res/drawable-hdpi/icon.png

- resource @layout/main 0x7f030000:
    * configuration default:
      located under res/layout/main.xml

- resource @color/accent 0x7f040000:
    * configuration default:
      located under res/values/colors.xml
        value #ffff8800

- resource @color/accent_alias 0x7f040001:
    * configuration default:
      located under res/values/colors.xml
        value @color/accent

- resource @+id/button 0x7f050000:
    * configuration default:
      located under res/values/ids.xml
        value false
";
        assert_eq!(dump, expected);
    }

    #[test]
    fn values_are_grouped_by_file() {
        let table = sample();
        let values = values_dump(&table);
        assert_eq!(
            values.keys().collect::<Vec<_>>(),
            vec!["res/values/colors.xml", "res/values/ids.xml", "res/values/strings.xml"]
        );
        assert_eq!(
            values["res/values/strings.xml"],
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources>\n    <item type=\"string\" name=\"app_name\">Demo &amp; co</item>\n</resources>\n"
        );
        assert!(values["res/values/ids.xml"].contains("<item type=\"id\" name=\"button\"/>"));
        assert_eq!(values_by_path(&table)["res/values/colors.xml"].len(), 2);
    }

    #[test]
    fn values_keep_quotes_as_written() {
        let mut table = TableBuilder::new();
        let msg = table.string("Don't \"stop\" <now>");
        let mut package = PackageBuilder::new(0x7f, "com.example");
        package.type_spec(1, "string", 1);
        package.type_chunk(
            1,
            Configuration::default(),
            TypeLayout::Dense,
            vec![Some(EntryData::string("msg", msg))],
        );
        table.package(package);
        let table = ResourceTable::parse(&table.to_bytes()).unwrap();
        assert!(values_dump(&table)["res/values/strings.xml"]
            .contains("<item type=\"string\" name=\"msg\">Don't \"stop\" &lt;now&gt;</item>"));
    }

    #[test]
    fn file_paths_come_from_string_data() {
        assert_eq!(
            physical_file_paths(&sample()),
            vec!["res/drawable-hdpi/icon.png", "res/layout/main.xml"]
        );
    }
}
