use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use survey_core::{decode, encode, CellMap, CodecIssue, EncodedForm, FULL_SENTINEL};

fn random_map(rng: &mut ChaCha8Rng, width: u32, height: u32, density: f64) -> CellMap {
    let cells = (0..width * height).map(|_| rng.gen_bool(density)).collect();
    CellMap::from_row_major(width, height, cells).expect("cell count matches")
}

#[test]
fn random_maps_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xC0DEC);
    for _ in 0..300 {
        let height = rng.gen_range(1..40);
        let width = height * 2;
        let density = [0.0, 0.02, 0.5, 0.98, 1.0][rng.gen_range(0..5)];
        let map = random_map(&mut rng, width, height, density);

        let encoded = encode(&map);
        let decoded = decode(&encoded, width, height);
        assert!(decoded.is_clean(), "{encoded:?}: {:?}", decoded.issues);
        assert_eq!(decoded.map, map, "{width}x{height} via {encoded:?}");

        if map.is_full() {
            assert_eq!(encoded, FULL_SENTINEL);
            assert_eq!(decoded.form, EncodedForm::Sentinel);
        } else {
            assert_eq!(decoded.form, EncodedForm::RunLength);
            assert!(!encoded.ends_with(','));
        }
    }
}

#[test]
fn legacy_literals_decode_cell_for_cell() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    for _ in 0..50 {
        let height = rng.gen_range(1..12);
        let width = height * 2;
        let map = random_map(&mut rng, width, height, 0.4);
        let literal: String = map
            .as_slice()
            .iter()
            .map(|cell| if *cell { '1' } else { '0' })
            .collect();

        let decoded = decode(&literal, width, height);
        assert_eq!(decoded.form, EncodedForm::Legacy);
        assert_eq!(decoded.map, map);
    }
}

#[test]
fn legacy_check_runs_before_sentinel_and_hex() {
    // a single cell grid: "1" is a legacy literal even though it is also hex
    let decoded = decode("1", 1, 1);
    assert_eq!(decoded.form, EncodedForm::Legacy);
    assert!(decoded.map.get(0, 0));

    // one character too long for legacy falls through to flat hex
    let decoded = decode("10101", 2, 2);
    assert_eq!(decoded.form, EncodedForm::FlatHex);
    assert_eq!(decoded.issues, vec![CodecIssue::TrailingData { extra: 4 }]);

    // the sentinel must match exactly
    let decoded = decode("XX", 2, 2);
    assert_eq!(decoded.form, EncodedForm::FlatHex);
    assert_eq!(
        decoded.issues,
        vec![
            CodecIssue::TrailingData { extra: 1 },
            CodecIssue::InvalidChar {
                position: 0,
                found: 'X'
            },
        ]
    );
}

#[test]
fn arbitrary_input_never_panics() {
    const ALPHABET: &[u8] = b"0123456789ABCDEFXxz, ";
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for _ in 0..2_000 {
        let len = rng.gen_range(0..64);
        let text: String = (0..len)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        let decoded = decode(&text, 20, 10);
        assert_eq!(decoded.map.width(), 20);
        assert_eq!(decoded.map.height(), 10);
    }
}

#[test]
fn huge_run_counts_are_capped() {
    let decoded = decode("FFFFFFFF,F", 20, 10);
    assert!(decoded.map.is_full());
    assert_eq!(decoded.issues, vec![CodecIssue::Overflow { expected: 50 }]);
}
