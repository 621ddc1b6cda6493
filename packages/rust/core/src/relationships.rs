//! Relationship inference from the co-occurrence model.

use factlearn_shared::{Fact, Link, Relationship};

use crate::model::CoOccurrenceModel;

/// Relate facts whose traits appear together in some model group.
///
/// For each group, the facts with a trait in that group are paired in
/// listing order (first-listed is the source). Pairs sharing a trait are
/// skipped. A pair matching several groups yields one relationship per
/// group. Returns the number of relationships appended to `link`.
pub fn build_relationships(
    model: &CoOccurrenceModel,
    link: &mut Link,
    facts: &[Fact],
    edge: &str,
) -> usize {
    let before = link.relationships.len();

    for group in model.groups() {
        let matches: Vec<&Fact> = facts
            .iter()
            .filter(|f| group.contains(&f.trait_name))
            .collect();

        for (i, source) in matches.iter().enumerate() {
            for target in &matches[i + 1..] {
                if source.trait_name != target.trait_name {
                    link.relationships
                        .push(Relationship::new(source, edge, target));
                }
            }
        }
    }

    link.relationships.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_text;
    use factlearn_shared::{Ability, OperationId};

    fn ability(command: &str) -> Ability {
        Ability {
            ability_id: command.into(),
            technique_id: "T1".into(),
            test: encode_text(command),
        }
    }

    fn model(commands: &[&str]) -> CoOccurrenceModel {
        let abilities: Vec<_> = commands.iter().map(|c| ability(c)).collect();
        CoOccurrenceModel::from_abilities(&abilities).expect("model")
    }

    fn link() -> Link {
        Link::new(OperationId::new(), "paw", ability(""))
    }

    fn pairs(link: &Link) -> Vec<(String, String)> {
        link.relationships
            .iter()
            .map(|r| (r.source.value.clone(), r.target.value.clone()))
            .collect()
    }

    #[test]
    fn pairs_in_listing_order_and_skips_same_trait() {
        let model = model(&["#{host.name} #{host.ip}"]);
        let facts = vec![
            Fact::new("host.name", "box1"),
            Fact::new("host.ip", "10.0.0.1"),
            Fact::new("host.ip", "10.0.0.2"),
            Fact::new("host.user", "root"),
        ];
        let mut link = link();

        assert_eq!(build_relationships(&model, &mut link, &facts, "has"), 2);
        assert_eq!(
            pairs(&link),
            vec![
                ("box1".to_string(), "10.0.0.1".to_string()),
                ("box1".to_string(), "10.0.0.2".to_string()),
            ]
        );
        assert!(link.relationships.iter().all(|r| r.edge == "has"));
        assert!(
            link.relationships
                .iter()
                .all(|r| r.source.trait_name != r.target.trait_name)
        );
    }

    #[test]
    fn overlapping_groups_emit_duplicate_edges() {
        let model = model(&["#{a} #{b}", "#{a} #{b} #{c}"]);
        let facts = vec![Fact::new("a", "1"), Fact::new("b", "2")];
        let mut link = link();

        assert_eq!(build_relationships(&model, &mut link, &facts, "has"), 2);
        assert_eq!(link.relationships[0], link.relationships[1]);
    }

    #[test]
    fn unrelated_traits_produce_nothing() {
        let model = model(&["#{a} #{b}"]);
        let facts = vec![Fact::new("a", "1"), Fact::new("c", "3")];
        let mut link = link();

        assert_eq!(build_relationships(&model, &mut link, &facts, "has"), 0);
        assert!(link.relationships.is_empty());
    }

    #[test]
    fn empty_model_produces_nothing() {
        let facts = vec![Fact::new("a", "1"), Fact::new("b", "2")];
        let mut link = link();
        assert_eq!(
            build_relationships(&CoOccurrenceModel::default(), &mut link, &facts, "has"),
            0
        );
    }
}
