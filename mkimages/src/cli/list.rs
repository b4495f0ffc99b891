use std::io::Write;

use crate::{pipeline::Plan, target::AliasPair, Result};

struct Row {
    reference: String,
    /// What the reference is produced from.
    source: String,
    phase: &'static str,
}

impl Row {
    fn alias(pair: &AliasPair, phase: &'static str) -> Self {
        Self {
            reference: pair.destination.to_string(),
            source: pair.source.reference().to_string(),
            phase,
        }
    }
}

pub fn list(plan: &Plan, out: &mut dyn Write) -> Result<()> {
    use comfy_table::{Attribute, Cell, ContentArrangement, Table};

    let mut rows: Vec<Row> = plan
        .targets
        .iter()
        .map(|target| Row {
            reference: target.reference().to_string(),
            source: format!(
                "{kind} Dockerfile on {family} {os_version}",
                kind = target.kind(),
                family = target.os_family(),
                os_version = target.os_version(),
            ),
            phase: "build",
        })
        .collect();
    rows.extend(plan.default_roots.iter().map(|pair| Row::alias(pair, "build")));
    rows.extend(plan.aliases.iter().map(|pair| Row::alias(pair, "alias")));
    if let Some(private) = &plan.private {
        rows.extend(private.base.iter().map(|pair| Row::alias(pair, "private")));
        rows.extend(
            private
                .aliases
                .iter()
                .map(|pair| Row::alias(pair, "private alias")),
        );
    }

    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["reference", "source", "phase"]
                .into_iter()
                .map(|name| Cell::new(name).add_attribute(Attribute::Bold)),
        );

    for row in rows {
        table.add_row([row.reference, row.source, row.phase.to_owned()]);
    }

    writeln!(out, "{table}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        alias::{AliasPolicy, AliasTable},
        dockerfile::ImageKind,
        matrix::{self, Naming, OsAxis, OsVersion},
        os::OsFamily,
    };

    #[test]
    fn lists_every_reference() {
        let matrix = matrix::expand(
            Naming {
                namespace: "r",
                image: "l",
            },
            &["5.4.7".to_owned()],
            &[OsAxis::new(OsFamily::Ubuntu, [OsVersion::new("20")])],
            &[ImageKind::Ci],
        );
        let plan = Plan::new(
            matrix,
            &AliasTable::new().with_aliases("5.4.7", ["5.4"]),
            AliasPolicy::default(),
            Some("reg.io".parse().unwrap()),
        );

        let mut out = Vec::new();
        list(&plan, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        for reference in [
            "r/ubuntu20/l-ci:5.4.7",
            "r/l-ci:5.4.7",
            "r/ubuntu20/l-ci:5.4",
            "r/l-ci:5.4",
            "reg.io/r/ubuntu20/l-ci:5.4.7",
            "reg.io/r/l-ci:5.4",
        ] {
            assert!(out.contains(reference), "{reference} missing from\n{out}");
        }
        assert!(out.contains("private alias"));
        assert!(out.contains("ci Dockerfile on ubuntu 20"), "{out}");
    }
}
