use tabled::{Table, Tabled};

#[derive(Tabled)]
struct HandlerRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Handler")]
    name: String,
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = loaderscope_runtime::build_default_registry();
    let rows: Vec<HandlerRow> = registry
        .handlers()
        .iter()
        .chain(std::iter::once(registry.fallback()))
        .enumerate()
        .map(|(index, handler)| HandlerRow {
            index,
            name: handler.name().to_string(),
        })
        .collect();

    println!("{}", Table::new(rows));
    println!("The last handler is the fallback for unrecognised loaders.");
    Ok(())
}
