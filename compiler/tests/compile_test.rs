use std::collections::HashMap;

use brine_pb_compiler::{compile, compile_all, compile_schema, merge_extensions, parse_proto, ProtoError};
use brine_pb_schema::{DefKind, Label, Primitive, TypeRef, Value, WireError};

const PLAYER_PROTO2: &str = r#"
    syntax = "proto2";
    package my.game;

    message Player {
      required int32 id = 1;
      optional string name = 2;

      enum PlayerState {
        IDLE = 0;
        ACTIVE = 1;
        BANNED = 2;
      }
      optional PlayerState state = 3;

      message Position {
        required float x = 1;
        required float y = 2;
        required float z = 3;
      }
      optional Position pos = 4;

      repeated int32 items = 5 [packed=true];
      map<string, int32> stats = 6;
    }
"#;

fn object<'a>(name: &'a str, fields: Vec<(&'a str, Value<'a>)>) -> Value<'a> {
    Value::Object(name, fields.into_iter().collect())
}

fn stats_entry<'a>(key: &str, value: i32) -> Value<'a> {
    object(
        "my.game.Player_stats_entry",
        vec![("key", Value::String(key.to_string())), ("value", Value::Int32(value))],
    )
}

#[test]
fn test_compile_flat_descriptor_map() {
    let schema = compile_schema(PLAYER_PROTO2).expect("compile_schema failed");

    let names: Vec<&str> = schema.defs.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "my.game.Player",
            "my.game.Player_stats_entry",
            "my.game.Player.Position",
            "my.game.Player.PlayerState",
        ]
    );

    let player = schema.def_by_name("my.game.Player").unwrap().as_message().unwrap();
    let fields: Vec<(&str, u32, &str)> = player
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.tag, schema.type_name(f.type_ref)))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("id", 1, "int32"),
            ("name", 2, "string"),
            ("state", 3, "my.game.Player.PlayerState"),
            ("pos", 4, "my.game.Player.Position"),
            ("items", 5, "int32"),
            ("stats", 6, "my.game.Player_stats_entry"),
        ]
    );
    assert_eq!(player.fields[0].label, Label::Required);
    assert!(player.fields[4].packed);
    assert_eq!(player.fields[5].label, Label::Repeated);
    assert!(!player.fields[5].packed);

    let entry = schema
        .def_by_name("my.game.Player_stats_entry")
        .unwrap()
        .as_message()
        .unwrap();
    assert_eq!(entry.field_by_tag(1).unwrap().name, "key");
    assert_eq!(entry.field_by_tag(1).unwrap().type_ref, TypeRef::Primitive(Primitive::String));
    assert_eq!(entry.field_by_tag(2).unwrap().name, "value");

    let state = schema.def_by_name("my.game.Player.PlayerState").unwrap();
    assert!(matches!(state.kind, DefKind::Enum(_)));
}

#[test]
fn test_proto2_round_trip() {
    let schema = compile_schema(PLAYER_PROTO2).unwrap();
    let player = object(
        "my.game.Player",
        vec![
            ("id", Value::Int32(123)),
            ("name", Value::String("PlayerOne".to_string())),
            ("state", Value::Enum("my.game.Player.PlayerState", "ACTIVE")),
            (
                "pos",
                object(
                    "my.game.Player.Position",
                    vec![
                        ("x", Value::Float(10.5)),
                        ("y", Value::Float(20.0)),
                        ("z", Value::Float(-5.25)),
                    ],
                ),
            ),
            (
                "items",
                Value::Array(vec![Value::Int32(100), Value::Int32(200), Value::Int32(300)]),
            ),
            ("stats", Value::Array(vec![stats_entry("strength", 15), stats_entry("mana", 100)])),
        ],
    );

    let bytes = player.encode(&schema, "my.game.Player").unwrap();
    assert_eq!(schema.size_of("my.game.Player", &player).unwrap(), bytes.len());
    let decoded = Value::decode(&schema, "my.game.Player", &bytes).unwrap();
    assert_eq!(decoded, player);
}

#[test]
fn test_map_order_independent() {
    let schema = compile_schema(
        r#"
        syntax = "proto3";
        message P { map<string, int32> stats = 1; }
        "#,
    )
    .unwrap();

    let entry = |key: &str, value| {
        object(
            "P_stats_entry",
            vec![("key", Value::String(key.to_string())), ("value", Value::Int32(value))],
        )
    };
    let as_map = |bytes: &[u8]| -> HashMap<String, i32> {
        let value = Value::decode(&schema, "P", bytes).unwrap();
        value
            .get("stats")
            .unwrap()
            .map_entries()
            .into_iter()
            .map(|(k, v)| (k.as_string().to_string(), v.as_int32()))
            .collect()
    };

    let ab = object("P", vec![("stats", Value::Array(vec![entry("a", 1), entry("b", 2)]))]);
    let ba = object("P", vec![("stats", Value::Array(vec![entry("b", 2), entry("a", 1)]))]);
    let ab = ab.encode(&schema, "P").unwrap();
    let ba = ba.encode(&schema, "P").unwrap();
    assert_ne!(ab, ba);
    assert_eq!(as_map(&ab), as_map(&ba));
    assert_eq!(as_map(&ab), HashMap::from([("a".to_string(), 1), ("b".to_string(), 2)]));
}

#[test]
fn test_concrete_packed_scenario() {
    let schema = compile_schema(
        "message P { optional int32 id = 1; optional string name = 2; repeated int32 xs = 3 [packed=true]; }",
    )
    .unwrap();
    let value = object(
        "P",
        vec![
            ("id", Value::Int32(5)),
            ("name", Value::String("hi".to_string())),
            (
                "xs",
                Value::Array(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]),
            ),
        ],
    );
    let bytes = value.encode(&schema, "P").unwrap();
    assert_eq!(bytes, [0x08, 0x05, 0x12, 0x02, b'h', b'i', 0x1A, 0x03, 0x01, 0x02, 0x03]);
    assert_eq!(Value::decode(&schema, "P", &bytes).unwrap(), value);
}

#[test]
fn test_non_contiguous_enum() {
    let schema = compile_schema(
        r#"
        syntax = "proto3";
        enum Status { UNKNOWN = 0; ACTIVE = 2; BANNED = 5; }
        message User { Status status = 1; repeated Status history = 2; }
        "#,
    )
    .unwrap();
    for name in ["UNKNOWN", "ACTIVE", "BANNED"] {
        let value = object(
            "User",
            vec![
                ("status", Value::Enum("Status", name)),
                ("history", Value::Array(vec![Value::Enum("Status", name), Value::Enum("Status", "BANNED")])),
            ],
        );
        let bytes = value.encode(&schema, "User").unwrap();
        assert_eq!(Value::decode(&schema, "User", &bytes).unwrap(), value);
    }

    // Repeated enums are packed by default in proto3.
    let value = object(
        "User",
        vec![("history", Value::Array(vec![Value::Enum("Status", "ACTIVE"), Value::Enum("Status", "BANNED")]))],
    );
    assert_eq!(value.encode(&schema, "User").unwrap(), [0x12, 2, 2, 5]);
}

const PLAYER_BASE: &str = r#"
    syntax = "proto2";
    package game;

    message Player {
      extensions 100 to 199;
      required int32 id = 1;
      optional string name = 2;
    }
"#;

const PLAYER_EXTENSION: &str = r#"
    syntax = "proto2";
    package game;

    extend Player {
      optional int32 level = 100;
      optional string guild = 101;
      repeated string achievements = 102;
    }
"#;

#[test]
fn test_extensions_merge_into_flat_object() {
    let base = parse_proto(PLAYER_BASE).unwrap();
    let extension = parse_proto(PLAYER_EXTENSION).unwrap();
    let schema = compile_all(&[base, extension]).unwrap();

    let player = object(
        "game.Player",
        vec![
            ("id", Value::Int32(42)),
            ("name", Value::String("ExamplePlayer".to_string())),
            ("level", Value::Int32(15)),
            ("guild", Value::String("TestGuild".to_string())),
            (
                "achievements",
                Value::Array(vec![
                    Value::String("first_login".to_string()),
                    Value::String("level_10".to_string()),
                ]),
            ),
        ],
    );
    let bytes = player.encode(&schema, "game.Player").unwrap();
    assert_eq!(Value::decode(&schema, "game.Player", &bytes).unwrap(), player);

    let def = schema.def_by_name("game.Player").unwrap().as_message().unwrap();
    assert_eq!(def.field_by_tag(100).unwrap().name, "level");
    assert_eq!(def.fields.len(), 5);
}

#[test]
fn test_merge_extensions_is_idempotent() {
    let extension = parse_proto(PLAYER_EXTENSION).unwrap();
    let mut schema = compile_all(&[parse_proto(PLAYER_BASE).unwrap(), extension.clone()]).unwrap();
    let before = schema.clone();
    merge_extensions(&extension, &mut schema).unwrap();
    assert_eq!(schema, before);
}

#[test]
fn test_extension_errors() {
    let base = parse_proto(PLAYER_BASE).unwrap();

    let clash = parse_proto("package game; extend Player { optional int64 level = 100; }").unwrap();
    let mut schema = compile_all(&[base.clone(), parse_proto(PLAYER_EXTENSION).unwrap()]).unwrap();
    assert!(matches!(
        merge_extensions(&clash, &mut schema),
        Err(ProtoError::DuplicateTag { tag: 100, .. })
    ));

    let base_tag = parse_proto("package game; extend Player { optional int32 other = 1; }").unwrap();
    assert!(matches!(
        compile_all(&[base.clone(), base_tag]),
        Err(ProtoError::DuplicateTag { tag: 1, .. })
    ));

    let out_of_range = parse_proto("package game; extend Player { optional int32 x = 300; }").unwrap();
    assert!(matches!(
        compile_all(&[base.clone(), out_of_range]),
        Err(ProtoError::ExtensionOutOfRange { tag: 300, .. })
    ));

    let unknown = parse_proto("package game; extend Ghost { optional int32 x = 100; }").unwrap();
    assert!(matches!(
        compile_all(&[base, unknown]),
        Err(ProtoError::UnknownExtensionTarget(ref name)) if name == "Ghost"
    ));
}

#[test]
fn test_nested_extend_block() {
    let schema = compile_schema(
        r#"
        package game;
        message Player { extensions 100 to max; optional int32 id = 1; }
        message Guild {
          extend Player { optional Guild guild = 100; }
          optional string name = 1;
        }
        "#,
    )
    .unwrap();
    let player = schema.def_by_name("game.Player").unwrap().as_message().unwrap();
    let guild = player.field_by_tag(100).unwrap();
    assert_eq!(schema.type_name(guild.type_ref), "game.Guild");
}

#[test]
fn test_cross_file_references() {
    let common = parse_proto("syntax = \"proto3\"; package common; message Vec3 { float x = 1; float y = 2; float z = 3; }").unwrap();
    let game = parse_proto("syntax = \"proto3\"; package game; import \"common.proto\"; message Unit { common.Vec3 pos = 1; }").unwrap();
    let schema = compile_all(&[common, game]).unwrap();
    let unit = schema.def_by_name("game.Unit").unwrap().as_message().unwrap();
    assert_eq!(schema.type_name(unit.fields[0].type_ref), "common.Vec3");
}

#[test]
fn test_self_referential_message() {
    let schema = compile_schema("syntax = \"proto3\"; message Node { int32 value = 1; repeated Node children = 2; }").unwrap();
    let tree = object(
        "Node",
        vec![
            ("value", Value::Int32(1)),
            (
                "children",
                Value::Array(vec![
                    object("Node", vec![("value", Value::Int32(2))]),
                    object(
                        "Node",
                        vec![
                            ("value", Value::Int32(3)),
                            ("children", Value::Array(vec![object("Node", vec![("value", Value::Int32(4))])])),
                        ],
                    ),
                ]),
            ),
        ],
    );
    let bytes = tree.encode(&schema, "Node").unwrap();
    assert_eq!(
        bytes,
        [0x08, 1, 0x12, 2, 0x08, 2, 0x12, 6, 0x08, 3, 0x12, 2, 0x08, 4]
    );
    assert_eq!(Value::decode(&schema, "Node", &bytes).unwrap(), tree);
}

#[test]
fn test_compile_errors() {
    assert!(matches!(
        compile_schema("message P { optional Missing m = 1; }"),
        Err(ProtoError::UnknownFieldType { ref type_, .. }) if type_ == "Missing"
    ));
    assert!(matches!(
        compile_schema("message P {} message P {}"),
        Err(ProtoError::DuplicateType(ref name)) if name == "P"
    ));
    assert!(matches!(
        compile_schema("message P { map<string, int32> m = 1; } message P_m_entry {}"),
        Err(ProtoError::DuplicateType(_))
    ));
    assert!(matches!(
        compile_schema("message P { optional int32 a = 1 }"),
        Err(ProtoError::ParseError { line: 1, .. })
    ));
}

#[test]
fn test_required_field_and_framing() {
    let mut schema = compile(&parse_proto(PLAYER_BASE).unwrap()).unwrap();
    let missing = object("game.Player", vec![("name", Value::String("x".to_string()))]);
    assert_eq!(
        missing.encode(&schema, "game.Player"),
        Err(WireError::MissingRequiredField {
            message: "game.Player".to_string(),
            field:   "id".to_string(),
        })
    );

    schema
        .add_framed("game.PlayerUpdate", "game.Player", Some("uint32"), None)
        .unwrap();
    let player = object("game.Player", vec![("id", Value::Int32(42))]);
    let bytes = player.encode(&schema, "game.PlayerUpdate").unwrap();
    assert_eq!(bytes, [2, 0x08, 42]);
    let (decoded, consumed) = schema.read("game.PlayerUpdate", &bytes).unwrap();
    assert_eq!(decoded, player);
    assert_eq!(consumed, 3);
}
