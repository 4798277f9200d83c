//! Adapter layer: Convert Mapbox DTOs to domain models

use super::dto;
use crate::enrichment::domain::AttributeResult;

/// The region of the first feature.
pub fn to_result(collection: &dto::FeatureCollection) -> AttributeResult {
    let region = collection
        .features
        .first()
        .into_iter()
        .flat_map(|f| f.context.iter())
        .find(|c| c.id.starts_with("region"))
        .map(|c| c.text.as_str());

    match region {
        Some(region) => AttributeResult::found([region]),
        None => AttributeResult::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(context: &[(&str, &str)]) -> dto::Feature {
        dto::Feature {
            id: "place.1".to_string(),
            text: None,
            place_name: None,
            context: context
                .iter()
                .map(|(id, text)| dto::ContextItem {
                    id: id.to_string(),
                    text: text.to_string(),
                    short_code: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_region_from_context() {
        let collection = dto::FeatureCollection {
            features: vec![feature(&[
                ("district.1", "Gallatin County"),
                ("region.9425", "Montana"),
                ("country.8940", "United States"),
            ])],
        };
        assert_eq!(
            to_result(&collection),
            AttributeResult::Found(vec!["Montana".into()])
        );
    }

    #[test]
    fn test_no_region_not_found() {
        let collection = dto::FeatureCollection {
            features: vec![feature(&[("country.8940", "United States")])],
        };
        assert_eq!(to_result(&collection), AttributeResult::NotFound);
    }

    #[test]
    fn test_no_features_not_found() {
        let collection = dto::FeatureCollection { features: vec![] };
        assert_eq!(to_result(&collection), AttributeResult::NotFound);
    }
}
