//! Property-based tests for the transform property
//!
//! For concurrent `a` and `b` with `(a', b') = transform(a, b)`, applying
//! `a` then `b'` must give the same state as `b` then `a'`.

use proptest::prelude::*;
use uuid::Uuid;
use xfcanvas::ot::spatial::{self, Entities};
use xfcanvas::ot::{linear, transform, OtOp};
use xfcanvas::shared::{Fields, OrderKey, Point, Value};

const DOC: &str = "text:doc";
const SHAPE: &str = "shape-1";

fn stamp(site: &str, logical_time: u64) -> OrderKey {
    OrderKey {
        logical_time,
        site: site.to_string(),
        surface: "code".to_string(),
        id: Uuid::nil(),
    }
}

fn text_op(len: usize) -> impl Strategy<Value = OtOp> {
    let insert = (0..=len, "[A-Z]{1,4}").prop_map(|(offset, text)| OtOp::insert_text(DOC, offset, text));
    if len == 0 {
        return insert.boxed();
    }
    let delete = (0..len)
        .prop_flat_map(move |offset| (Just(offset), 1..=len - offset))
        .prop_map(|(offset, length)| OtOp::delete_text(DOC, offset, length));
    prop_oneof![insert, delete].boxed()
}

fn text_case() -> impl Strategy<Value = (String, OtOp, OtOp)> {
    "[a-z]{0,12}".prop_flat_map(|doc| {
        let len = doc.chars().count();
        (Just(doc), text_op(len), text_op(len))
    })
}

fn apply_text(doc: &str, first: &OtOp, second: &OtOp) -> String {
    let mut document = doc.to_string();
    linear::apply(&mut document, &first.kind).unwrap();
    linear::apply(&mut document, &second.kind).unwrap();
    document
}

fn shape_op() -> impl Strategy<Value = OtOp> {
    prop_oneof![
        (-20i32..20, -20i32..20)
            .prop_map(|(x, y)| OtOp::move_by(SHAPE, Point::new(x as f64, y as f64))),
        ("(color|width|label)", -5i32..5).prop_map(|(field, value)| {
            OtOp::modify(SHAPE, Fields::from([(field, Value::Number(value as f64))]))
        }),
        (-20i32..20).prop_map(|x| {
            OtOp::modify(
                SHAPE,
                Fields::from([(
                    "position".to_string(),
                    Value::Point(Point::new(x as f64, 0.0)),
                )]),
            )
        }),
    ]
}

fn canvas() -> Entities {
    Entities::from([(
        SHAPE.to_string(),
        Value::map([
            ("position", Value::Point(Point::new(1.0, 2.0))),
            ("color", Value::Number(0.0)),
        ]),
    )])
}

fn apply_shape(first: &OtOp, second: &OtOp) -> Entities {
    let mut entities = canvas();
    spatial::apply(&mut entities, SHAPE, &first.kind).unwrap();
    spatial::apply(&mut entities, SHAPE, &second.kind).unwrap();
    entities
}

proptest! {
    #[test]
    fn test_linear_transform_converges(
        (doc, a, b) in text_case(),
        a_first in any::<bool>(),
    ) {
        let (ta, tb) = if a_first { (1, 2) } else { (2, 1) };
        let a = a.with_stamp(stamp("a", ta));
        let b = b.with_stamp(stamp("b", tb));
        let (a2, b2) = transform(&a, &b);

        prop_assert_eq!(apply_text(&doc, &a, &b2), apply_text(&doc, &b, &a2));
    }

    #[test]
    fn test_linear_transform_symmetric((doc, a, b) in text_case()) {
        let a = a.with_stamp(stamp("a", 1));
        let b = b.with_stamp(stamp("b", 1));
        let (a2, b2) = transform(&a, &b);
        let (b3, a3) = transform(&b, &a);

        prop_assert_eq!(&a2.kind, &a3.kind);
        prop_assert_eq!(&b2.kind, &b3.kind);
        prop_assert_eq!(apply_text(&doc, &a, &b2), apply_text(&doc, &b, &a3));
    }

    #[test]
    fn test_spatial_transform_converges(
        a in shape_op(),
        b in shape_op(),
        a_later in any::<bool>(),
    ) {
        let (ta, tb) = if a_later { (2, 1) } else { (1, 2) };
        let a = a.with_stamp(stamp("a", ta));
        let b = b.with_stamp(stamp("b", tb));
        let (a2, b2) = transform(&a, &b);

        prop_assert_eq!(apply_shape(&a, &b2), apply_shape(&b, &a2));
    }
}
