use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::schema::{now_value, number_value, FieldRule, FieldType, Schema};
use super::{Collection, Expansion};
use crate::database::store::{Document, FieldError};
use crate::filter::Condition;

pub const NAME: &str = "tours";

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "difficult"];

static TOURS: Lazy<Collection> = Lazy::new(|| {
    let schema = Schema::new(vec![
        FieldRule::string("name")
            .required("A tour must have a name")
            .trim()
            .max_length(40, Some("A tour name must have less or equal than 40 characters"))
            .min_length(10, Some("A tour name must have more or equal than 10 characters")),
        FieldRule::string("slug"),
        FieldRule::number("duration").required("A tour must have a duration"),
        FieldRule::number("maxGroupSize").required("A tour must have a group size"),
        FieldRule::string("difficulty")
            .required("A tour must have a difficulty")
            .one_of(DIFFICULTIES, Some("Difficulty is either: easy, medium, difficult")),
        FieldRule::number("ratingsQuantity").default_value(|| json!(0)),
        FieldRule::number("ratingsAverage")
            .default_value(|| json!(4.5))
            .min(1.0, Some("Rating must be above 1.0"))
            .max(5.0, Some("Rating must be below 5.0"))
            .setter(round_rating),
        FieldRule::number("price").required("A tour must have a price"),
        FieldRule::number("priceDiscount"),
        FieldRule::string("summary").required("A tour must have a summary").trim(),
        FieldRule::string("description").trim(),
        FieldRule::string("imageCover").required("A tour must have a cover image"),
        FieldRule::new("images", FieldType::StringArray),
        FieldRule::timestamp("createdAt").default_value(now_value),
        FieldRule::new("startDates", FieldType::TimestampArray),
        FieldRule::boolean("secretTour").default_value(|| json!(false)),
        FieldRule::new("startLocation", FieldType::Object),
        FieldRule::new("locations", FieldType::ObjectArray),
        FieldRule::new("guides", FieldType::ReferenceArray(super::user::NAME)),
    ])
    .with_rule(discount_below_price);

    let mut tours = Collection::new(NAME, schema);
    tours.base_filter = vec![Condition::ne("secretTour", true)];
    tours.hidden_fields = &["createdAt"];
    tours.unique = &[&["name"]];
    tours.expansions = vec![Expansion::Reference {
        path: "guides",
        collection: super::user::NAME,
        fields: &["name", "email", "photo", "role"],
    }];
    tours.on_create = Some(assign_slug);
    tours.virtuals = Some(duration_weeks);
    tours
});

pub fn collection() -> &'static Collection {
    &TOURS
}

/// Extra expansion for the single-tour read.
pub fn reviews_expansion() -> Expansion {
    Expansion::Related {
        path: "reviews",
        collection: super::review::NAME,
        foreign_field: "tour",
    }
}

fn round_rating(value: Value) -> Value {
    match value.as_f64() {
        Some(n) => number_value((n * 10.0).round() / 10.0).unwrap_or(value),
        None => value,
    }
}

fn discount_below_price(doc: &Document) -> Option<FieldError> {
    let discount = doc.get("priceDiscount")?.as_f64()?;
    let price = doc.get("price").and_then(Value::as_f64)?;
    if discount < price {
        return None;
    }
    Some(FieldError::new(
        "priceDiscount",
        format!("Discount price ({}) should be below regular price", discount),
    ))
}

fn assign_slug(doc: &mut Document) {
    if let Some(name) = doc.get("name").and_then(Value::as_str) {
        let slug = slugify(name);
        doc.insert("slug".to_string(), Value::String(slug));
    }
}

fn duration_weeks(doc: &mut Document) {
    if let Some(duration) = doc.get("duration").and_then(Value::as_f64) {
        if let Some(weeks) = serde_json::Number::from_f64(duration / 7.0) {
            doc.insert("durationWeeks".to_string(), Value::Number(weeks));
        }
    }
}

/// Lowercase, ASCII alphanumerics separated by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::store::{document, StoreError};

    fn valid_tour() -> Document {
        document(json!({
            "name": "The Forest Hiker",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg",
        }))
    }

    #[test]
    fn create_fills_defaults_and_slug() {
        let doc = collection().prepare_create(valid_tour()).expect("valid tour");
        assert_eq!(doc["slug"], json!("the-forest-hiker"));
        assert_eq!(doc["ratingsAverage"], json!(4.5));
        assert_eq!(doc["secretTour"], json!(false));
        assert_eq!(doc["__v"], json!(0));
        assert!(doc["createdAt"].is_string());
    }

    #[test]
    fn missing_required_fields_are_named() {
        let err = collection().prepare_create(document(json!({ "name": "x" }))).unwrap_err();
        let StoreError::Validation(errors) = err else { panic!("expected validation error") };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "duration", "maxGroupSize", "difficulty", "price", "summary", "imageCover"]);
        assert_eq!(errors[0].message, "A tour name must have more or equal than 10 characters");
    }

    #[test]
    fn discount_must_stay_below_price() {
        let mut tour = valid_tour();
        tour.insert("priceDiscount".into(), json!(500));
        let err = collection().prepare_create(tour).unwrap_err();
        assert!(err.to_string().contains("Discount price (500) should be below regular price"));
    }

    #[test]
    fn rating_is_rounded_to_one_decimal() {
        let mut tour = valid_tour();
        tour.insert("ratingsAverage".into(), json!(4.666));
        let doc = collection().prepare_create(tour).expect("valid tour");
        assert_eq!(doc["ratingsAverage"], json!(4.7));
    }

    #[test]
    fn presentation_hides_created_at_and_adds_weeks() {
        let doc = collection().prepare_create(valid_tour()).expect("valid tour");
        let out = collection().present(doc, None);
        assert!(out.get("createdAt").is_none());
        assert!(out.get("__v").is_none());
        assert!((out["durationWeeks"].as_f64().unwrap() - 5.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("The Sea Explorer"), "the-sea-explorer");
        assert_eq!(slugify("  Snow -- Adventurer! "), "snow-adventurer");
    }
}
