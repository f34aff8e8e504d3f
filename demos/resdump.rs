use binres::android::{binary_xml, dump, ResourceTable};
use std::env;
use std::error::Error;
use std::fs;

// Usage:
//   resdump entries <resources.arsc>
//   resdump values <resources.arsc>
//   resdump files <resources.arsc>
//   resdump xml <resources.arsc> <compiled.xml>
fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: resdump entries|values|files <resources.arsc>");
        eprintln!("       resdump xml <resources.arsc> <compiled.xml>");
        std::process::exit(2);
    }

    // Do everything else with the error trap
    if let Err(e) = run(&args[1], &args[2], args.get(3).map(String::as_str)) {
        eprintln!("Aborted due to error: {}", e);
        std::process::exit(1);
    }
}

fn run(mode: &str, arsc: &str, xml: Option<&str>) -> Result<(), Box<dyn Error>> {
    let table = ResourceTable::from_file(arsc)?;

    match mode {
        "entries" => println!("{}", dump::entries_dump(&table)),
        "values" => {
            for (path, doc) in dump::values_dump(&table) {
                println!("path {}:\n{}", path, doc);
            }
        }
        "files" => {
            for path in dump::physical_file_paths(&table) {
                println!("{}", path);
            }
        }
        "xml" => {
            let xml = xml.ok_or("xml mode needs a compiled XML file")?;
            let bytes = fs::read(xml)?;
            let report = binary_xml::decode_report(&bytes, &table, &binary_xml::XmlOptions::default())?;
            print!("{}", report.text);
            for id in report.unresolved {
                eprintln!("unresolved reference {}", id);
            }
        }
        other => return Err(format!("unknown mode {}", other).into()),
    }
    Ok(())
}
