//! # Binres
//!
//! A reader for Android's compiled resources: the `resources.arsc` table and
//! the binary XML documents (layouts, manifests, ...) that reference it.
//!
//! # Examples
//!
//! ```no_run
//!  use binres::android::{binary_xml, ResourceTable};
//!
//!  let table = ResourceTable::from_file("resources.arsc").unwrap();
//!  let id = table.lookup(None, "string", "app_name").unwrap();
//!  println!("{:?}", table.default_entry(id));
//!
//!  let layout = std::fs::read("res/layout/main.xml").unwrap();
//!  println!("{}", binary_xml::decode(&layout, &table).unwrap());
//! ```

pub mod android;

pub use android::{ResError, ResResult, ResourceTable};
