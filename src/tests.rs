use crate::baseset;
use crate::baseset_from_hashset;
use crate::fullreposet;
use crate::generatorset;
use crate::idset;
use crate::idset_range;
use crate::nameset_from_dag;
use crate::spanset;
use crate::testutil::test_hash;
use crate::testutil::TestRepo;
use crate::Direction;
use crate::Error;
use crate::Hash20;
use crate::Predicate;
use crate::Repo;
use crate::Result;
use crate::RevId;
use crate::RevSet;
use crate::Set;
use crate::MAX_ID;
use crate::NULL_ID;
use std::collections::BTreeSet;
use std::collections::HashSet;

fn ids(set: &Set) -> Vec<RevId> {
    set.iter().unwrap().map(|rev| rev.unwrap()).collect()
}

fn elements(set: &Set) -> BTreeSet<RevId> {
    ids(set).into_iter().collect()
}

#[test]
fn test_baseset_algebra_keeps_insertion_order() -> Result<()> {
    let repo = TestRepo::new(8);
    let a = baseset(vec![4, 0, 7, 6], repo.repo());
    let b = baseset(vec![5, 6, 7, 3], repo.repo());

    assert_eq!(ids(&a.union(&b)?), [4, 0, 7, 6, 5, 3]);
    assert_eq!(ids(&a.intersect(&b)?), [7, 6]);
    assert_eq!(ids(&a.subtract(&b)?), [4, 0]);

    // Intersection and difference inherit the receiver's (unspecified)
    // direction.
    assert_eq!(a.intersect(&b)?.direction(), Direction::Unspecified);
    Ok(())
}

#[test]
fn test_baseset_algebra_after_sorting() -> Result<()> {
    let repo = TestRepo::new(8);
    let a = baseset(vec![4, 0, 7, 6], repo.repo()).sort(true)?;
    let b = baseset(vec![5, 6, 7, 3], repo.repo());

    assert_eq!(ids(&a.union(&b)?), [7, 6, 4, 0, 5, 3]);
    assert_eq!(ids(&a.intersect(&b)?), [7, 6]);
    assert_eq!(ids(&a.subtract(&b)?), [4, 0]);
    Ok(())
}

#[test]
fn test_hashset_input_is_deterministic() -> Result<()> {
    let repo = TestRepo::new(8);
    let xs: HashSet<RevId> = vec![4, 0, 7, 6].into_iter().collect();
    let ys: HashSet<RevId> = vec![5, 6, 7, 3].into_iter().collect();
    let a = baseset_from_hashset(xs, repo.repo());
    let b = baseset_from_hashset(ys, repo.repo());

    assert_eq!(ids(&a.union(&b)?), [0, 4, 6, 7, 3, 5]);
    assert_eq!(ids(&a.intersect(&b)?), [6, 7]);
    assert_eq!(ids(&a.subtract(&b)?), [0, 4]);
    Ok(())
}

#[test]
fn test_idset_iteration_and_extremes() -> Result<()> {
    let repo = TestRepo::new(20);
    let set = idset(vec![1, 3, 2, 4, 11, 10], repo.repo());
    assert_eq!(ids(&set), [11, 10, 4, 3, 2, 1]);
    assert_eq!(ids(&set.reverse()?), [1, 2, 3, 4, 10, 11]);
    assert_eq!(set.len()?, 6);
    assert_eq!(set.min()?, Some(1));
    assert_eq!(set.max()?, Some(11));
    Ok(())
}

#[test]
fn test_spanset_strips_invalid_and_virtual_ids() -> Result<()> {
    let repo = TestRepo::new(6);
    let span = spanset(repo.repo(), 0, MAX_ID)?;
    let base = baseset(vec![NULL_ID, 0, 5], repo.repo());
    let result = span.intersect(&base)?;
    assert_eq!(ids(&result), [0, 5]);
    assert!(result.is_ascending());
    Ok(())
}

#[test]
fn test_spanset_injects_null_at_the_matching_end() -> Result<()> {
    let repo = TestRepo::new(4);
    let asc = spanset(repo.repo(), NULL_ID, 4)?;
    assert_eq!(ids(&asc), [NULL_ID, 0, 1, 2, 3]);
    let desc = spanset(repo.repo(), 3, NULL_ID - 1)?;
    assert_eq!(ids(&desc), [3, 2, 1, 0, NULL_ID]);
    Ok(())
}

#[test]
fn test_spanset_direction_follows_bounds() -> Result<()> {
    let repo = TestRepo::new(10);
    assert_eq!(ids(&spanset(repo.repo(), 2, 6)?), [2, 3, 4, 5]);
    assert_eq!(ids(&spanset(repo.repo(), 6, 2)?), [6, 5, 4, 3]);
    Ok(())
}

#[test]
fn test_generatorset_consumes_stream_once() -> Result<()> {
    let repo = TestRepo::new(8);
    let (iter, pulled) = crate::testutil::CountingIter::new(vec![0, 1, 4]);
    let set = generatorset(iter, Some(Direction::Ascending), repo.repo());
    assert_eq!(set.last()?, Some(4));
    assert_eq!(set.last()?, Some(4));
    assert_eq!(pulled.load(std::sync::atomic::Ordering::Relaxed), 3);
    Ok(())
}

#[test]
fn test_filtered_idset_with_progress() -> Result<()> {
    let repo = TestRepo::new(12);
    let subset = idset_range(repo.repo(), 0, 10, true)?;
    let set = subset.filter(Predicate::new(|rev| Ok(rev % 2 == 0)));
    let mut it = set.iter()?;
    let mut kept = Vec::new();
    while let Some(rev) = it.next() {
        kept.push(rev?);
    }
    assert_eq!(kept, [0, 2, 4, 6, 8, 10]);
    assert!(!set.contains(3)?);
    assert!(set.contains(4)?);
    // The bar counted visited ids, not kept ids.
    let bars = repo.repo().progress().bars();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].position(), 11);
    drop(it);
    Ok(())
}

#[test]
fn test_fullreposet_intersection_is_identity() -> Result<()> {
    let repo = TestRepo::new(8);
    let full = fullreposet(repo.repo())?;
    let virtuals = baseset(vec![NULL_ID, 2, 5], repo.repo());
    // The identity is blind: the receiver trusts the other operand,
    // so even virtual ids survive.
    assert_eq!(elements(&full.intersect(&virtuals)?), elements(&virtuals));
    let other = idset(vec![1, 4], repo.repo());
    assert_eq!(ids(&other.intersect(&full)?), [4, 1]);
    Ok(())
}

#[test]
fn test_nameset_union_with_virtual_members_falls_back() -> Result<()> {
    let repo = TestRepo::new(8);
    let name = spanset(repo.repo(), 0, 3)?;
    let base = baseset(vec![NULL_ID, 5], repo.repo());
    let union = name.union(&base)?;
    // The union kept the virtual id even though one operand is
    // dag-backed.
    assert!(union.contains(NULL_ID)?);
    assert_eq!(elements(&union), vec![NULL_ID, 0, 1, 2, 5].into_iter().collect());
    Ok(())
}

#[test]
fn test_nameset_algebra_preserves_receiver_direction() -> Result<()> {
    let repo = TestRepo::new(10);
    let a = spanset(repo.repo(), 0, 8)?; // ascending
    let b = idset(vec![2, 5, 7, 9], repo.repo());
    let result = a.intersect(&b)?;
    assert_eq!(ids(&result), [2, 5, 7]);
    assert!(result.is_ascending());
    let desc = spanset(repo.repo(), 8, 0)?; // descending
    let result = desc.intersect(&b)?;
    assert_eq!(ids(&result), [7, 5, 2]);
    assert!(result.is_descending());
    Ok(())
}

#[test]
fn test_iter_ctx_prefetches_text() -> Result<()> {
    let repo = TestRepo::new(4);
    let set = idset(vec![0, 1, 2], repo.repo()).prefetch(vec!["text"]);
    let ctxs: Vec<_> = set.iter_ctx()?.collect::<Result<_>>()?;
    assert_eq!(ctxs.len(), 3);
    assert_eq!(ctxs[0].rev, 2);
    assert_eq!(ctxs[0].text.as_deref(), Some(&b"commit 2\n"[..]));
    assert_eq!(ctxs[2].text.as_deref(), Some(&b"commit 0\n"[..]));
    Ok(())
}

#[test]
fn test_iter_ctx_without_prefetch_has_no_text() -> Result<()> {
    let repo = TestRepo::new(4);
    let set = idset(vec![0, 1], repo.repo());
    let ctxs: Vec<_> = set.iter_ctx()?.collect::<Result<_>>()?;
    assert!(ctxs.iter().all(|ctx| ctx.text.is_none()));
    assert_eq!(ctxs[0].hash, test_hash(1));
    Ok(())
}

#[test]
fn test_unknown_prefetch_field_is_a_programming_error() {
    let repo = TestRepo::new(4);
    let set = idset(vec![0, 1], repo.repo()).prefetch(vec!["trees"]);
    match set.iter_ctx() {
        Err(Error::UnknownPrefetchField(field)) => assert_eq!(field, "trees"),
        other => panic!("expected UnknownPrefetchField, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_prefetch_by_template_symbols() -> Result<()> {
    let repo = TestRepo::new(4);
    let set = idset(vec![0, 1], repo.repo());
    let tagged = set.prefetch_by_template_symbols(vec!["author", "rev"])?;
    assert!(tagged.prefetch_fields().contains("text"));
    // No symbols: the default template's fields apply.
    let default = set.prefetch_by_template_symbols(Vec::<&str>::new())?;
    assert!(default.prefetch_fields().contains("text"));
    Ok(())
}

#[test]
fn test_custom_prefetch_pipeline() -> Result<()> {
    let repo = TestRepo::new(4);
    repo.repo().prefetch().register(
        "rewrite",
        std::sync::Arc::new(|_repo: &Repo, stream: crate::CtxIter| -> crate::CtxIter {
            Box::new(stream.map(|ctx| {
                let mut ctx = ctx?;
                ctx.text = Some(b"rewritten".to_vec());
                Ok(ctx)
            }))
        }),
    );
    let set = idset(vec![0], repo.repo()).prefetch(vec!["rewrite"]);
    let ctxs: Vec<_> = set.iter_ctx()?.collect::<Result<_>>()?;
    assert_eq!(ctxs[0].text.as_deref(), Some(&b"rewritten"[..]));
    Ok(())
}

#[test]
fn test_repo_gone_surfaces_for_lazy_sets() -> Result<()> {
    let repo = TestRepo::new(6);
    let set = spanset(repo.repo(), 0, 5)?;
    drop(repo);
    assert!(matches!(set.iter(), Err(Error::RepoGone)));
    assert!(matches!(set.len(), Err(Error::RepoGone)));
    Ok(())
}

#[test]
fn test_filtered_union_uses_generic_paths() -> Result<()> {
    let repo = TestRepo::new(10);
    let filtered = idset(vec![1, 2, 3, 4], repo.repo())
        .filter(Predicate::builtin(|rev| Ok(rev != 3)));
    let union = baseset(vec![4, 5], repo.repo()).union(&baseset(vec![6], repo.repo()))?;
    let result = filtered.intersect(&union)?;
    assert_eq!(ids(&result), [4]);
    let result = union.subtract(&filtered)?;
    assert_eq!(ids(&result), [5, 6]);
    Ok(())
}

#[test]
fn test_cached_sets_are_computed_once() -> Result<()> {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    let repo = TestRepo::new(6);
    let calls = std::sync::Arc::new(AtomicUsize::new(0));
    let compute = {
        let calls = calls.clone();
        move |repo: &Repo| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(idset(vec![1, 2], repo))
        }
    };
    let first = repo.repo().cached_set("visible", &compute)?;
    let second = repo.repo().cached_set("visible", &compute)?;
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(calls.load(Ordering::Relaxed), 1);
    Ok(())
}

// Property tests over the different representations of the same ids.

fn norm_ids(raw: Vec<u8>) -> Vec<RevId> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|v| (v % 32) as RevId)
        .filter(|v| seen.insert(*v))
        .collect()
}

fn representations(repo: &Repo, ids: &[RevId]) -> Vec<Set> {
    let hash_set: HashSet<RevId> = ids.iter().copied().collect();
    let mut sorted: Vec<RevId> = ids.to_vec();
    sorted.sort_unstable();
    let hashes: Vec<Hash20> = ids.iter().map(|&id| test_hash(id)).collect();
    let handle = repo.dag().set_from_hashes(hashes).unwrap();
    vec![
        baseset(ids.to_vec(), repo),
        baseset_from_hashset(hash_set, repo),
        idset(ids.iter().copied(), repo),
        generatorset(sorted.into_iter(), Some(Direction::Ascending), repo),
        nameset_from_dag(repo, handle, false),
        baseset(ids.to_vec(), repo).filter(Predicate::builtin(|_| Ok(true))),
    ]
}

fn strictly_increasing(ids: &[RevId]) -> bool {
    ids.windows(2).all(|w| w[0] < w[1])
}

quickcheck::quickcheck! {
    fn prop_sort_is_idempotent(raw: Vec<u8>) -> bool {
        let input = norm_ids(raw);
        let repo = TestRepo::new(32);
        for set in representations(repo.repo(), &input) {
            for &reverse in &[false, true] {
                let once = set.sort(reverse).unwrap();
                let twice = once.sort(reverse).unwrap();
                if ids(&once) != ids(&twice) {
                    return false;
                }
            }
        }
        true
    }

    fn prop_reverse_is_an_involution(raw: Vec<u8>) -> bool {
        let input = norm_ids(raw);
        let repo = TestRepo::new(32);
        for set in representations(repo.repo(), &input) {
            let back = set.reverse().unwrap().reverse().unwrap();
            if ids(&set) != ids(&back) || set.direction() != back.direction() {
                return false;
            }
        }
        true
    }

    fn prop_direction_agrees_with_order(raw: Vec<u8>) -> bool {
        let input = norm_ids(raw);
        let repo = TestRepo::new(32);
        for set in representations(repo.repo(), &input) {
            let asc = set.sort(false).unwrap();
            if asc.is_ascending() && !strictly_increasing(&ids(&asc)) {
                return false;
            }
            let desc = set.sort(true).unwrap();
            let mut order = ids(&desc);
            order.reverse();
            if desc.is_descending() && !strictly_increasing(&order) {
                return false;
            }
        }
        true
    }

    fn prop_intersection_is_commutative(raw_a: Vec<u8>, raw_b: Vec<u8>) -> bool {
        let input_a = norm_ids(raw_a);
        let input_b = norm_ids(raw_b);
        let model: BTreeSet<RevId> = input_a
            .iter()
            .filter(|id| input_b.contains(id))
            .copied()
            .collect();
        let repo = TestRepo::new(32);
        for a in representations(repo.repo(), &input_a) {
            for b in representations(repo.repo(), &input_b) {
                if elements(&a.intersect(&b).unwrap()) != model {
                    return false;
                }
                if elements(&b.intersect(&a).unwrap()) != model {
                    return false;
                }
            }
        }
        true
    }

    fn prop_difference_matches_the_model(raw_a: Vec<u8>, raw_b: Vec<u8>) -> bool {
        let input_a = norm_ids(raw_a);
        let input_b = norm_ids(raw_b);
        let model: BTreeSet<RevId> = input_a
            .iter()
            .filter(|id| !input_b.contains(id))
            .copied()
            .collect();
        let repo = TestRepo::new(32);
        for a in representations(repo.repo(), &input_a) {
            for b in representations(repo.repo(), &input_b) {
                let result = a.subtract(&b).unwrap();
                if elements(&result) != model {
                    return false;
                }
                for id in &model {
                    if !result.contains(*id).unwrap() {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn prop_union_is_complete_and_duplicate_free(raw_a: Vec<u8>, raw_b: Vec<u8>) -> bool {
        let input_a = norm_ids(raw_a);
        let input_b = norm_ids(raw_b);
        let model: BTreeSet<RevId> = input_a.iter().chain(input_b.iter()).copied().collect();
        let repo = TestRepo::new(32);
        for a in representations(repo.repo(), &input_a) {
            for b in representations(repo.repo(), &input_b) {
                let result = a.union(&b).unwrap();
                let listed = ids(&result);
                let unique: BTreeSet<RevId> = listed.iter().copied().collect();
                if listed.len() != unique.len() || unique != model {
                    return false;
                }
            }
        }
        true
    }

    fn prop_fullreposet_is_an_intersection_identity(raw: Vec<u8>) -> bool {
        let input = norm_ids(raw);
        let repo = TestRepo::new(32);
        let full = fullreposet(repo.repo()).unwrap();
        for set in representations(repo.repo(), &input) {
            if elements(&full.intersect(&set).unwrap()) != elements(&set) {
                return false;
            }
            if elements(&set.intersect(&full).unwrap()) != elements(&set) {
                return false;
            }
        }
        true
    }

    fn prop_slice_windows_compose(raw: Vec<u8>, a: u8, b: u8, c: u8, d: u8) -> bool {
        let input = norm_ids(raw);
        let repo = TestRepo::new(32);
        let (a, b, c, d) = (a as i64 % 40, b as i64 % 40, c as i64 % 40, d as i64 % 40);
        for set in representations(repo.repo(), &input) {
            let len = set.len().unwrap() as i64;
            if ids(&set.slice(0, len).unwrap()) != ids(&set) {
                return false;
            }
            if !ids(&set.slice(b.max(a), a.min(b)).unwrap()).is_empty() {
                return false;
            }
            let nested = set.slice(a, b).unwrap().slice(c, d).unwrap();
            let direct = set.slice(a + c, (a + d).min(b)).unwrap();
            if ids(&nested) != ids(&direct) {
                return false;
            }
        }
        true
    }

    fn prop_prefetch_is_transparent(raw: Vec<u8>) -> bool {
        let input = norm_ids(raw);
        let repo = TestRepo::new(32);
        for set in representations(repo.repo(), &input) {
            let tagged = set.prefetch(vec!["text"]);
            if ids(&set) != ids(&tagged) {
                return false;
            }
            if set.contains(7).unwrap() != tagged.contains(7).unwrap() {
                return false;
            }
        }
        true
    }

    fn prop_generator_membership_is_stable(raw: Vec<u8>, probe: u8) -> bool {
        let input = norm_ids(raw);
        let probe = (probe % 32) as RevId;
        let repo = TestRepo::new(32);
        let mut sorted = input.clone();
        sorted.sort_unstable();
        let set = generatorset(sorted.into_iter(), Some(Direction::Ascending), repo.repo());
        let first = set.contains(probe).unwrap();
        let second = set.contains(probe).unwrap();
        first == second && first == input.contains(&probe)
    }
}
