use dotlint::rules::{RuleInfo, RuleRegistry};

use crate::{
    app::GlobalOptions,
    output::{print_output, Align, TabWriter},
};

pub fn run(global: &GlobalOptions) -> anyhow::Result<()> {
    let registry = RuleRegistry::new();
    let infos: Vec<&RuleInfo> = registry.infos().collect();

    print_output(&infos, global, |infos| {
        let mut tw = TabWriter::new(&[
            ("Check", Align::Left),
            ("Name", Align::Left),
            ("Severity", Align::Left),
            ("Category", Align::Left),
            ("Runtime", Align::Right),
            ("Description", Align::Left),
        ]);
        for info in infos {
            tw.row(vec![
                info.check_id.to_string(),
                info.name.to_string(),
                info.severity.to_string(),
                info.category.to_string(),
                info.min_runtime
                    .map_or_else(|| "any".to_string(), |runtime| format!("{runtime}+")),
                info.description.to_string(),
            ]);
        }
        tw.print();
    })
}
