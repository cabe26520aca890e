use polars::prelude::*;

use compdir::company::Company;
use compdir::export::{HEADERS, write_csv};

fn tricky() -> Company {
    Company {
        id: Some(1),
        name: "Acme, \"Inc\"".into(),
        location: "New York".into(),
        industry: "Technology".into(),
        employees: "1000+".into(),
        revenue: "$1M - $10M".into(),
        website: "acme.example".into(),
        founded: "1999".into(),
        status: "Active".into(),
    }
}

#[test]
fn exported_file_parses_as_csv() -> PolarsResult<()> {
    let dir = std::env::temp_dir().join(format!("compdir-export-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("companies_directory.csv");

    let rows = vec![
        tricky(),
        Company {
            id: Some(2),
            name: "Globex".into(),
            status: "Inactive".into(),
            ..tricky()
        },
    ];
    let written = write_csv(&path.to_string_lossy(), &rows).unwrap();
    assert_eq!(written, path);

    let df = LazyCsvReader::new(PlPath::Local(path.as_path().into()))
        .with_has_header(true)
        .finish()?
        .collect()?;

    assert_eq!(df.height(), 2);
    let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
    assert_eq!(names, HEADERS.to_vec());

    let name = df.column("Name")?.str()?;
    assert_eq!(name.get(0), Some("Acme, \"Inc\""));
    assert_eq!(name.get(1), Some("Globex"));
    let website = df.column("Website")?.str()?;
    assert_eq!(website.get(0), Some("'acme.example"));

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
