use proptest::prelude::*;

use randomart::{Grammar, PRESETS, Rng, SynthError, Variable, Variables, derive, parse_expression};

fn preset_grammar(index: usize) -> Grammar {
    PRESETS[index % PRESETS.len()].compile().unwrap()
}

fn unit() -> impl Strategy<Value = f32> {
    -1.0f32..=1.0
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn same_seed_same_tree(seed in any::<u32>(), preset in 0usize..16, depth in 0u32..8) {
        let g = preset_grammar(preset);
        let a = derive(&g, g.start_symbol(), depth, &mut Rng::seed(seed)).unwrap();
        let b = derive(&g, g.start_symbol(), depth, &mut Rng::seed(seed)).unwrap();
        prop_assert_eq!(a.root.to_string(), b.root.to_string());
        prop_assert_eq!(a.nodes as usize, a.root.node_count());
    }

    #[test]
    fn evaluation_stays_in_range(
        seed in any::<u32>(),
        preset in 0usize..16,
        depth in 0u32..8,
        x in unit(),
        y in unit(),
        t in unit(),
        band in prop::array::uniform10(-4.0f32..4.0),
    ) {
        let g = preset_grammar(preset);
        let d = derive(&g, g.start_symbol(), depth, &mut Rng::seed(seed)).unwrap();
        let mut vars = Variables::NONE;
        for (v, value) in Variable::ALL.into_iter().zip(band) {
            vars.set(v, value);
        }
        for c in d.root.eval_with(x, y, t, &vars) {
            prop_assert!((-1.0..=1.0).contains(&c), "{} at ({x}, {y}, {t}) gave {c}", d.root);
        }
    }

    #[test]
    fn canonical_form_parses_back(seed in any::<u32>(), preset in 0usize..16, depth in 0u32..7) {
        let g = preset_grammar(preset);
        let original = derive(&g, g.start_symbol(), depth, &mut Rng::seed(seed)).unwrap().root;
        let text = original.to_string();
        let parsed = parse_expression(&text).unwrap();
        prop_assert_eq!(parsed.to_string(), text);
        prop_assert_eq!(parsed.node_count(), original.node_count());
        for (x, y) in [(-1.0, -1.0), (0.25, -0.5), (0.9, 0.1)] {
            let a = original.eval(x, y, 0.3).map(f32::to_bits);
            let b = parsed.eval(x, y, 0.3).map(f32::to_bits);
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn self_referential_grammars_terminate(
        seed in any::<u32>(),
        depth in 0u32..10,
        weights in prop::array::uniform4(0.1f32..5.0),
    ) {
        let text = format!(
            "A :: sum(A, B):{} | sin(A):{} | B:{} | y:{}\nB :: A:1 | x:1 | mix(A, B, A):1",
            weights[0], weights[1], weights[2], weights[3]
        );
        let g = Grammar::compile(&text).unwrap();
        let d = derive(&g, "A", depth, &mut Rng::seed(seed)).unwrap();
        prop_assert!(d.root.depth() <= depth as usize + 1);
    }

    #[test]
    fn grammars_without_exit_fail_instead_of_looping(seed in any::<u32>(), depth in 0u32..10) {
        let g = Grammar::compile("A :: sum(A, A):1 | sin(A):1").unwrap();
        let err = derive(&g, "A", depth, &mut Rng::seed(seed)).unwrap_err();
        prop_assert!(matches!(err, SynthError::DepthExhausted { .. }), "expected DepthExhausted, got {:?}", err);
    }
}
