use crate::android::chunk::{
    ChunkHeader, ChunkReader, RES_STRING_POOL_TYPE, RES_TABLE_LIBRARY_TYPE,
    RES_TABLE_OVERLAYABLE_POLICY_TYPE, RES_TABLE_OVERLAYABLE_TYPE, RES_TABLE_PACKAGE_TYPE,
    RES_TABLE_STAGED_ALIAS_TYPE, RES_TABLE_TYPE, RES_TABLE_TYPE_SPEC_TYPE, RES_TABLE_TYPE_TYPE,
};
use crate::android::config::Configuration;
use crate::android::error::{ResError, ResErrorKind, ResResult};
use crate::android::string_pool::StringPool;
use crate::android::value::{DecodedValue, ResValue};
use bitflags::bitflags;
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Offset marking an entry that is not defined for a configuration.
pub const NO_ENTRY: u32 = 0xFFFF_FFFF;
const NO_ENTRY_OFFSET16: u16 = 0xFFFF;

const TYPE_FLAG_SPARSE: u8 = 0x01;
const TYPE_FLAG_OFFSET16: u8 = 0x02;

const PACKAGE_NAME_UNITS: usize = 128;

const ATTR_TYPE: u32 = 0x0100_0000;
const ATTR_MIN: u32 = 0x0100_0001;
const ATTR_MAX: u32 = 0x0100_0002;
const ATTR_L10N: u32 = 0x0100_0003;
const ATTR_OTHER: u32 = 0x0100_0004;
const ATTR_ZERO: u32 = 0x0100_0005;
const ATTR_ONE: u32 = 0x0100_0006;
const ATTR_TWO: u32 = 0x0100_0007;
const ATTR_FEW: u32 = 0x0100_0008;
const ATTR_MANY: u32 = 0x0100_0009;
const ATTR_INDEX_BASE: u32 = 0x0200_0000;
const ATTR_INDEX_MASK: u32 = 0xFFFF_0000;

/// A packed `0xPPTTEEEE` resource identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceId(pub u32);

impl ResourceId {
    pub fn from_parts(package: u8, type_id: u8, entry: u16) -> Self {
        ResourceId(((package as u32) << 24) | ((type_id as u32) << 16) | entry as u32)
    }

    pub fn package(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn type_id(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn entry(&self) -> u16 {
        self.0 as u16
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// The symbolic name of a resource: package, type and entry name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceName {
    pub package: String,
    pub type_name: String,
    pub name: String,
}

impl ResourceName {
    /// The reference form used in resource XML, `@string/app_name` or
    /// `@+id/button`.
    pub fn resource_string(&self) -> String {
        if self.type_name == "id" {
            format!("@+id/{}", self.name)
        } else {
            format!("@{}/{}", self.type_name, self.name)
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.package, self.type_name, self.name)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct EntryFlags: u16 {
        const COMPLEX = 0x0001;
        const PUBLIC = 0x0002;
        const WEAK = 0x0004;
        const COMPACT = 0x0008;
    }
}

bitflags! {
    /// Per-entry flags of a type spec: which configuration axes the entry
    /// varies over, plus visibility bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct ConfigChanges: u32 {
        const MCC = 0x0001;
        const MNC = 0x0002;
        const LOCALE = 0x0004;
        const TOUCHSCREEN = 0x0008;
        const KEYBOARD = 0x0010;
        const KEYBOARD_HIDDEN = 0x0020;
        const NAVIGATION = 0x0040;
        const ORIENTATION = 0x0080;
        const DENSITY = 0x0100;
        const SCREEN_SIZE = 0x0200;
        const VERSION = 0x0400;
        const SCREEN_LAYOUT = 0x0800;
        const UI_MODE = 0x1000;
        const SMALLEST_SCREEN_SIZE = 0x2000;
        const LAYOUT_DIRECTION = 0x4000;
        const SCREEN_ROUND = 0x8000;
        const COLOR_MODE = 0x0001_0000;
        const GRAMMATICAL_GENDER = 0x0002_0000;
        const STAGED_API = 0x2000_0000;
        const PUBLIC = 0x4000_0000;
    }
}

/// Key of one item of a bag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum BagKey {
    /// Style items and attribute definitions: the attribute being set.
    Attribute(ResourceId),
    Type,
    Min,
    Max,
    L10n,
    Other,
    Zero,
    One,
    Two,
    Few,
    Many,
    /// Position in an array resource.
    Index(u16),
}

impl BagKey {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            ATTR_TYPE => BagKey::Type,
            ATTR_MIN => BagKey::Min,
            ATTR_MAX => BagKey::Max,
            ATTR_L10N => BagKey::L10n,
            ATTR_OTHER => BagKey::Other,
            ATTR_ZERO => BagKey::Zero,
            ATTR_ONE => BagKey::One,
            ATTR_TWO => BagKey::Two,
            ATTR_FEW => BagKey::Few,
            ATTR_MANY => BagKey::Many,
            raw if raw & ATTR_INDEX_MASK == ATTR_INDEX_BASE => BagKey::Index(raw as u16),
            raw => BagKey::Attribute(ResourceId(raw)),
        }
    }
}

impl fmt::Display for BagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BagKey::Attribute(id) => write!(f, "{id}"),
            BagKey::Type => write!(f, "^type"),
            BagKey::Min => write!(f, "^min"),
            BagKey::Max => write!(f, "^max"),
            BagKey::L10n => write!(f, "^l10n"),
            BagKey::Other => write!(f, "other"),
            BagKey::Zero => write!(f, "zero"),
            BagKey::One => write!(f, "one"),
            BagKey::Two => write!(f, "two"),
            BagKey::Few => write!(f, "few"),
            BagKey::Many => write!(f, "many"),
            BagKey::Index(index) => write!(f, "[{index}]"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BagItem {
    pub key: BagKey,
    pub value: DecodedValue,
}

/// A complex entry: styles, arrays, plurals and attribute definitions.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Bag {
    pub parent: Option<ResourceId>,
    pub items: Vec<BagItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum EntryValue {
    Simple(DecodedValue),
    Bag(Bag),
}

/// The value of one resource under one configuration.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResourceEntry {
    pub name: String,
    pub flags: EntryFlags,
    pub value: EntryValue,
}

impl ResourceEntry {
    pub fn simple_value(&self) -> Option<&DecodedValue> {
        match &self.value {
            EntryValue::Simple(value) => Some(value),
            EntryValue::Bag(_) => None,
        }
    }

    pub fn bag(&self) -> Option<&Bag> {
        match &self.value {
            EntryValue::Bag(bag) => Some(bag),
            EntryValue::Simple(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConfigEntry {
    pub config: Configuration,
    pub entry: ResourceEntry,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeSpec {
    pub id: u8,
    pub types_count: u16,
    pub flags: Vec<ConfigChanges>,
}

/// One row of a package's dynamic reference table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibraryEntry {
    pub package_id: u32,
    pub package_name: String,
}

#[derive(Clone, Debug, Default)]
pub struct Package {
    pub id: u8,
    pub name: String,
    pub last_public_type: u32,
    pub last_public_key: u32,
    pub type_id_offset: u32,
    pub type_names: StringPool,
    pub keys: StringPool,
    pub type_specs: BTreeMap<u8, TypeSpec>,
    pub libraries: Vec<LibraryEntry>,
}

impl Package {
    pub fn type_name(&self, type_id: u8) -> ResResult<&str> {
        let index = (type_id as u32)
            .checked_sub(self.type_id_offset)
            .and_then(|index| index.checked_sub(1))
            .ok_or_else(|| {
                ResError::new(ResErrorKind::MalformedChunk(format!(
                    "type id {} is below the package's type offset {}",
                    type_id, self.type_id_offset
                )))
            })?;
        self.type_names.get(index)
    }
}

/// A decoded `resources.arsc`.
///
/// Entries are kept per resource id in the order their configurations were
/// declared in the file.
#[derive(Clone, Debug, Default)]
pub struct ResourceTable {
    strings: StringPool,
    packages: Vec<Package>,
    ids: BTreeMap<String, BTreeMap<String, BTreeMap<String, ResourceId>>>,
    names: BTreeMap<ResourceId, ResourceName>,
    entries: BTreeMap<ResourceId, Vec<ConfigEntry>>,
}

impl ResourceTable {
    pub fn from_file(path: impl AsRef<Path>) -> ResResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    /// Decodes a whole resource table. Any unreadable chunk fails the decode.
    pub fn parse(bytes: &[u8]) -> ResResult<Self> {
        let mut reader = ChunkReader::new(bytes);
        let header = reader.read_chunk_header()?;
        if header.chunk_type != RES_TABLE_TYPE {
            return Err(malformed!(
                header.offset,
                "expected resource table chunk, found type 0x{:04x}",
                header.chunk_type
            ));
        }
        let mut table = ResourceTable::default();
        table
            .parse_table(&ChunkReader::new(bytes), &header)
            .map_err(|err| err.in_chunk(header.chunk_type, header.offset))?;
        Ok(table)
    }

    fn parse_table(&mut self, reader: &ChunkReader<'_>, header: &ChunkHeader) -> ResResult<()> {
        let package_count = reader.header_fields(header)?.read_u32()?;
        let chunk = reader.window(header.offset, header.end())?;
        let mut seen_strings = false;

        for child in chunk.window(header.body_start(), header.end())?.chunks() {
            let child = child?;
            match child.chunk_type {
                RES_STRING_POOL_TYPE if !seen_strings => {
                    self.strings = StringPool::parse(&chunk, &child)?;
                    seen_strings = true;
                }
                RES_TABLE_PACKAGE_TYPE => {
                    let package = self
                        .parse_package(&chunk, &child)
                        .map_err(|err| err.in_chunk(child.chunk_type, child.offset))?;
                    self.packages.push(package);
                }
                other => warn!(
                    "[arsc] skipping unexpected chunk 0x{:04x} at 0x{:x}",
                    other, child.offset
                ),
            }
        }

        if self.packages.len() != package_count as usize {
            warn!(
                "[arsc] table declares {} packages but holds {}",
                package_count,
                self.packages.len()
            );
        }
        Ok(())
    }

    fn parse_package(&mut self, reader: &ChunkReader<'_>, header: &ChunkHeader) -> ResResult<Package> {
        let mut fields = reader.header_fields(header)?;
        let id = fields.read_u32()?;
        let id = u8::try_from(id)
            .map_err(|_| malformed!(header.offset + 8, "package id 0x{:x} does not fit a byte", id))?;

        let name_offset = fields.position();
        let mut units = Vec::with_capacity(PACKAGE_NAME_UNITS);
        for _ in 0..PACKAGE_NAME_UNITS {
            units.push(fields.read_u16()?);
        }
        let name_len = units.iter().position(|u| *u == 0).unwrap_or(units.len());
        let name = String::from_utf16(&units[..name_len])
            .map_err(|err| malformed!(name_offset, "invalid package name: {}", err))?;

        let type_strings = fields.read_u32()? as usize;
        let last_public_type = fields.read_u32()?;
        let key_strings = fields.read_u32()? as usize;
        let last_public_key = fields.read_u32()?;
        let type_id_offset = if fields.remaining() >= 4 {
            fields.read_u32()?
        } else {
            0
        };

        let mut package = Package {
            id,
            name,
            last_public_type,
            last_public_key,
            type_id_offset,
            ..Package::default()
        };

        let chunk = reader.window(header.offset, header.end())?;
        let mut have_types = false;
        let mut have_keys = false;
        let mut type_chunks = 0usize;
        for child in chunk.window(header.body_start(), header.end())?.chunks() {
            let child = child?;
            match child.chunk_type {
                RES_STRING_POOL_TYPE => {
                    let relative = child.offset - header.offset;
                    let is_types = relative == type_strings || (!have_types && relative != key_strings);
                    if is_types && !have_types {
                        package.type_names = StringPool::parse(&chunk, &child)?;
                        have_types = true;
                    } else if !have_keys {
                        package.keys = StringPool::parse(&chunk, &child)?;
                        have_keys = true;
                    } else {
                        warn!("[arsc] extra string pool at 0x{:x} ignored", child.offset);
                    }
                }
                RES_TABLE_TYPE_SPEC_TYPE => {
                    let spec = parse_type_spec(&chunk, &child)
                        .map_err(|err| err.in_chunk(child.chunk_type, child.offset))?;
                    package.type_specs.insert(spec.id, spec);
                }
                RES_TABLE_TYPE_TYPE => {
                    self.parse_type(&package, &chunk, &child)
                        .map_err(|err| err.in_chunk(child.chunk_type, child.offset))?;
                    type_chunks += 1;
                }
                RES_TABLE_LIBRARY_TYPE => {
                    let libraries = parse_library(&chunk, &child)
                        .map_err(|err| err.in_chunk(child.chunk_type, child.offset))?;
                    package.libraries.extend(libraries);
                }
                RES_TABLE_OVERLAYABLE_TYPE
                | RES_TABLE_OVERLAYABLE_POLICY_TYPE
                | RES_TABLE_STAGED_ALIAS_TYPE => {}
                other => warn!(
                    "[arsc] skipping unknown chunk 0x{:04x} at 0x{:x} in package {}",
                    other, child.offset, package.name
                ),
            }
        }

        debug!(
            "[arsc] package 0x{:02x} {}: {} types, {} keys, {} type chunks",
            package.id,
            package.name,
            package.type_names.len(),
            package.keys.len(),
            type_chunks
        );
        Ok(package)
    }

    fn parse_type(
        &mut self,
        package: &Package,
        reader: &ChunkReader<'_>,
        header: &ChunkHeader,
    ) -> ResResult<()> {
        let mut fields = reader.header_fields(header)?;
        let type_id = fields.read_u8()?;
        let flags = fields.read_u8()?;
        let _reserved = fields.read_u16()?;
        let entry_count = fields.read_u32()? as usize;
        let entries_start = fields.read_u32()? as usize;
        let config = Configuration::parse(&mut fields)?;

        if type_id == 0 {
            return Err(malformed!(header.offset + 8, "type id 0 is reserved"));
        }
        let type_name = package.type_name(type_id)?.to_string();
        if let Some(spec) = package.type_specs.get(&type_id) {
            if entry_count > spec.flags.len() && flags & TYPE_FLAG_SPARSE == 0 {
                warn!(
                    "[arsc] type {} ({}) has {} entries, spec declares {}",
                    type_name,
                    config,
                    entry_count,
                    spec.flags.len()
                );
            }
        }

        let chunk = reader.window(header.offset, header.end())?;
        let mut offsets = chunk.window(header.body_start(), header.end())?;
        let mut present = Vec::new();
        if flags & TYPE_FLAG_SPARSE != 0 {
            for _ in 0..entry_count {
                let index = offsets.read_u16()? as usize;
                let offset = offsets.read_u16()? as usize * 4;
                present.push((index, offset));
            }
        } else if flags & TYPE_FLAG_OFFSET16 != 0 {
            for index in 0..entry_count {
                let offset = offsets.read_u16()?;
                if offset != NO_ENTRY_OFFSET16 {
                    present.push((index, offset as usize * 4));
                }
            }
        } else {
            for index in 0..entry_count {
                let offset = offsets.read_u32()?;
                if offset != NO_ENTRY {
                    present.push((index, offset as usize));
                }
            }
        }

        let data = chunk.window(header.offset + entries_start, header.end())?;
        for (index, offset) in present {
            let entry_index = u16::try_from(index)
                .map_err(|_| malformed!(header.offset, "entry index {} out of range", index))?;
            let id = ResourceId::from_parts(package.id, type_id, entry_index);
            let entry = self
                .read_entry(package, &data, data.start() + offset)
                .map_err(|err| err.for_resource(id.0))?;

            self.ids
                .entry(package.name.clone())
                .or_default()
                .entry(type_name.clone())
                .or_default()
                .entry(entry.name.clone())
                .or_insert(id);
            self.names.entry(id).or_insert_with(|| ResourceName {
                package: package.name.clone(),
                type_name: type_name.clone(),
                name: entry.name.clone(),
            });

            let declared = self.entries.entry(id).or_default();
            if declared.iter().any(|existing| existing.config == config) {
                warn!("[arsc] resource {} declared twice for {}", id, config);
            }
            declared.push(ConfigEntry {
                config: config.clone(),
                entry,
            });
        }
        Ok(())
    }

    fn read_entry(
        &self,
        package: &Package,
        data: &ChunkReader<'_>,
        offset: usize,
    ) -> ResResult<ResourceEntry> {
        let mut cursor = *data;
        cursor.seek(offset)?;
        let size = cursor.read_u16()?;
        let raw_flags = cursor.read_u16()?;
        let flags = EntryFlags::from_bits_retain(raw_flags);

        if flags.contains(EntryFlags::COMPACT) {
            let value = ResValue::new((raw_flags >> 8) as u8, cursor.read_u32()?)
                .decode(&self.strings)
                .map_err(|err| err.at(offset + 4))?;
            let name = package.keys.get(size as u32).map_err(|err| err.at(offset))?;
            return Ok(ResourceEntry {
                name: name.to_string(),
                flags: EntryFlags::from_bits_retain(raw_flags & 0x00FF),
                value: EntryValue::Simple(value),
            });
        }

        let key_offset = cursor.position();
        let name = package
            .keys
            .get(cursor.read_u32()?)
            .map_err(|err| err.at(key_offset))?
            .to_string();
        let value = if flags.contains(EntryFlags::COMPLEX) {
            let parent = cursor.read_u32()?;
            let count = cursor.read_u32()?;
            cursor.seek(offset + size as usize)?;
            let mut items = Vec::new();
            for _ in 0..count {
                let key = BagKey::from_raw(cursor.read_u32()?);
                items.push(BagItem {
                    key,
                    value: self.read_value(&mut cursor)?,
                });
            }
            EntryValue::Bag(Bag {
                parent: (parent != 0).then_some(ResourceId(parent)),
                items,
            })
        } else {
            cursor.seek(offset + size as usize)?;
            EntryValue::Simple(self.read_value(&mut cursor)?)
        };
        Ok(ResourceEntry { name, flags, value })
    }

    /// Reads and decodes one value cell; decode failures point at the cell.
    fn read_value(&self, cursor: &mut ChunkReader<'_>) -> ResResult<DecodedValue> {
        let cell = cursor.position();
        ResValue::read(cursor)?
            .decode(&self.strings)
            .map_err(|err| err.at(cell))
    }

    /// Finds a resource id by name. Without a package, packages are searched
    /// in declaration order.
    pub fn lookup(&self, package: Option<&str>, type_name: &str, name: &str) -> Option<ResourceId> {
        let find = |types: &BTreeMap<String, BTreeMap<String, ResourceId>>| {
            types.get(type_name).and_then(|names| names.get(name)).copied()
        };
        match package {
            Some(package) => self.ids.get(package).and_then(find),
            None => self
                .packages
                .iter()
                .filter_map(|p| self.ids.get(&p.name))
                .find_map(find),
        }
    }

    /// The entry declared for exactly `config`; the last declaration wins.
    pub fn resolve(&self, id: ResourceId, config: &Configuration) -> Option<&ResourceEntry> {
        self.entries(id)
            .iter()
            .rev()
            .find(|declared| declared.config == *config)
            .map(|declared| &declared.entry)
    }

    /// The default-configuration entry, or the first declared one.
    pub fn default_entry(&self, id: ResourceId) -> Option<&ResourceEntry> {
        let entries = self.entries(id);
        entries
            .iter()
            .rev()
            .find(|declared| declared.config.is_default())
            .or_else(|| entries.first())
            .map(|declared| &declared.entry)
    }

    /// Maps the package byte of a dynamic reference through the packages'
    /// library tables, to the id the named package was loaded with. Ids that
    /// are already declared, or that no library entry covers, are returned
    /// unchanged.
    pub fn remap_dynamic(&self, id: ResourceId) -> ResourceId {
        if self.names.contains_key(&id) {
            return id;
        }
        self.packages
            .iter()
            .flat_map(|package| &package.libraries)
            .filter(|library| library.package_id == id.package() as u32)
            .find_map(|library| self.packages.iter().find(|p| p.name == library.package_name))
            .map(|target| ResourceId::from_parts(target.id, id.type_id(), id.entry()))
            .unwrap_or(id)
    }

    pub fn name_of(&self, id: ResourceId) -> Option<&ResourceName> {
        self.names.get(&id)
    }

    /// Every configuration `id` is declared for, in file order.
    pub fn entries(&self, id: ResourceId) -> &[ConfigEntry] {
        self.entries.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn resources(&self) -> impl Iterator<Item = (ResourceId, &[ConfigEntry])> + '_ {
        self.entries.iter().map(|(id, entries)| (*id, entries.as_slice()))
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package(&self, id: u8) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == id)
    }

    /// The table's global value string pool.
    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_type_spec(reader: &ChunkReader<'_>, header: &ChunkHeader) -> ResResult<TypeSpec> {
    let mut fields = reader.header_fields(header)?;
    let id = fields.read_u8()?;
    let _res0 = fields.read_u8()?;
    let types_count = fields.read_u16()?;
    let entry_count = fields.read_u32()? as usize;
    if id == 0 {
        return Err(malformed!(header.offset + 8, "type spec id 0 is reserved"));
    }

    let mut body = reader.bounded(header)?;
    let mut flags = Vec::with_capacity(entry_count.min(body.remaining() / 4));
    for _ in 0..entry_count {
        flags.push(ConfigChanges::from_bits_retain(body.read_u32()?));
    }
    Ok(TypeSpec {
        id,
        types_count,
        flags,
    })
}

fn parse_library(reader: &ChunkReader<'_>, header: &ChunkHeader) -> ResResult<Vec<LibraryEntry>> {
    let count = reader.header_fields(header)?.read_u32()? as usize;
    let mut body = reader.bounded(header)?;
    let mut libraries = Vec::new();
    for _ in 0..count {
        let package_id = body.read_u32()?;
        let name_offset = body.position();
        let mut units = Vec::with_capacity(PACKAGE_NAME_UNITS);
        for _ in 0..PACKAGE_NAME_UNITS {
            units.push(body.read_u16()?);
        }
        let len = units.iter().position(|u| *u == 0).unwrap_or(units.len());
        let package_name = String::from_utf16(&units[..len])
            .map_err(|err| malformed!(name_offset, "invalid library name: {}", err))?;
        libraries.push(LibraryEntry {
            package_id,
            package_name,
        });
    }
    Ok(libraries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::builder::{EntryData, PackageBuilder, TableBuilder, TypeLayout};

    fn demo_table() -> Vec<u8> {
        let mut table = TableBuilder::new();
        let hello = table.string("Hello");
        let hallo = table.string("Hallo");
        let mut package = PackageBuilder::new(0x7f, "com.example.demo");
        package.type_spec(1, "string", 2);
        package.type_chunk(
            1,
            Configuration::default(),
            TypeLayout::Dense,
            vec![
                Some(EntryData::string("greeting", hello)),
                Some(EntryData::int("count", 3)),
            ],
        );
        let german = Configuration {
            language: *b"de",
            ..Configuration::default()
        };
        package.type_chunk(
            1,
            german,
            TypeLayout::Dense,
            vec![Some(EntryData::string("greeting", hallo)), None],
        );
        table.package(package);
        table.to_bytes()
    }

    #[test]
    fn resource_id_parts() {
        let id = ResourceId::from_parts(0x7f, 0x02, 0x0013);
        assert_eq!(id.0, 0x7f02_0013);
        assert_eq!((id.package(), id.type_id(), id.entry()), (0x7f, 0x02, 0x13));
        assert_eq!(id.to_string(), "0x7f020013");
    }

    #[test]
    fn decodes_configurations_in_declaration_order() {
        let table = ResourceTable::parse(&demo_table()).unwrap();
        let id = table
            .lookup(Some("com.example.demo"), "string", "greeting")
            .unwrap();
        assert_eq!(id, ResourceId(0x7f01_0000));

        let configs: Vec<String> = table
            .entries(id)
            .iter()
            .map(|declared| declared.config.to_string())
            .collect();
        assert_eq!(configs, vec!["default", "de"]);

        let german = table.entries(id)[1].config.clone();
        assert_eq!(
            table.resolve(id, &german).unwrap().simple_value(),
            Some(&DecodedValue::String("Hallo".to_string()))
        );
        assert_eq!(
            table.default_entry(id).unwrap().simple_value(),
            Some(&DecodedValue::String("Hello".to_string()))
        );
    }

    #[test]
    fn dense_no_entry_is_skipped() {
        let table = ResourceTable::parse(&demo_table()).unwrap();
        let count = table.lookup(None, "string", "count").unwrap();
        assert_eq!(table.entries(count).len(), 1);
        assert!(table.entries(count)[0].config.is_default());
        assert_eq!(
            table.default_entry(count).unwrap().simple_value(),
            Some(&DecodedValue::IntDec(3))
        );
    }

    #[test]
    fn names_round_trip() {
        let table = ResourceTable::parse(&demo_table()).unwrap();
        for (id, _) in table.resources() {
            let name = table.name_of(id).unwrap();
            assert_eq!(
                table.lookup(Some(&name.package), &name.type_name, &name.name),
                Some(id)
            );
        }
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn rejects_non_table_input() {
        let mut builder = crate::tests::builder::StringPoolBuilder::new(false);
        builder.intern("x");
        let err = ResourceTable::parse(&builder.to_chunk()).unwrap_err();
        assert!(matches!(err.kind(), ResErrorKind::MalformedChunk(_)));
    }

    #[test]
    fn bag_keys() {
        assert_eq!(BagKey::from_raw(0x0100_0000), BagKey::Type);
        assert_eq!(BagKey::from_raw(0x0100_0006), BagKey::One);
        assert_eq!(BagKey::from_raw(0x0200_0003), BagKey::Index(3));
        assert_eq!(
            BagKey::from_raw(0x0101_0098),
            BagKey::Attribute(ResourceId(0x0101_0098))
        );
        assert_eq!(BagKey::Index(3).to_string(), "[3]");
    }

    #[test]
    fn resource_strings() {
        let name = ResourceName {
            package: "android".to_string(),
            type_name: "id".to_string(),
            name: "button".to_string(),
        };
        assert_eq!(name.resource_string(), "@+id/button");
        assert_eq!(name.to_string(), "android:id/button");
    }
}
