//! Archetype tables and entity locations of a world.

use std::collections::HashMap;
use std::ptr::NonNull;

use indexmap::{IndexMap, IndexSet};
use xias::Xias;

use crate::archetype::{self, Archetype, ErasedValue, Signature};
use crate::comp::{Component, TypeExpression, TypeKey};
use crate::entity::pool::IdentityPool;
use crate::entity::Identity;
use crate::mask::Mask;
use crate::query::Queries;
use crate::{Error, Result};

/// Index of an archetype in [`Storage`].
///
/// Indices of garbage-collected archetypes are reused.
pub(crate) type ArchetypeId = usize;

/// The archetype with the empty signature, which is never garbage-collected.
pub(crate) const ROOT: ArchetypeId = 0;

/// Where an entity is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Location {
    pub(crate) archetype: ArchetypeId,
    pub(crate) row:       usize,
}

pub(crate) struct Storage {
    archetypes:   Vec<Option<Archetype>>,
    /// Indices of `archetypes` freed by garbage collection.
    vacant:       Vec<ArchetypeId>,
    by_signature: IndexMap<Signature, ArchetypeId>,
    /// Archetypes with a signature expression targeting the key.
    by_target:    HashMap<Identity, Vec<ArchetypeId>>,
    /// Locations indexed by identity index.
    locations:    Vec<Option<Location>>,
}

impl Storage {
    pub(crate) fn new(capacity: usize) -> Self {
        let mut by_signature = IndexMap::new();
        by_signature.insert(Signature::default(), ROOT);

        Self {
            archetypes: vec![Some(Archetype::root())],
            vacant: Vec::new(),
            by_signature,
            by_target: HashMap::new(),
            locations: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn archetype(&self, id: ArchetypeId) -> &Archetype {
        self.archetypes
            .get(id)
            .and_then(Option::as_ref)
            .expect("archetype id refers to a live archetype")
    }

    fn archetype_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        self.archetypes
            .get_mut(id)
            .and_then(Option::as_mut)
            .expect("archetype id refers to a live archetype")
    }

    /// Iterates over all live archetypes.
    pub(crate) fn archetypes(&self) -> impl Iterator<Item = (ArchetypeId, &Archetype)> + '_ {
        self.archetypes
            .iter()
            .enumerate()
            .filter_map(|(id, archetype)| Some((id, archetype.as_ref()?)))
    }

    pub(crate) fn archetype_count(&self) -> usize { self.by_signature.len() }

    /// The number of entities stored in all archetypes.
    pub(crate) fn entity_count(&self) -> usize {
        self.archetypes().map(|(_, archetype)| archetype.len()).sum()
    }

    /// The archetypes satisfying `mask`.
    pub(crate) fn matching(&self, mask: &Mask) -> Vec<ArchetypeId> {
        self.archetypes()
            .filter(|(_, archetype)| mask.matches(archetype))
            .map(|(id, _)| id)
            .collect()
    }

    /// Where `identity` is stored.
    ///
    /// Returns `None` for stale identities whose index has been reused.
    pub(crate) fn location(&self, identity: Identity) -> Option<Location> {
        let location = (*self.locations.get(identity.index().small_int::<usize>())?)?;
        let stored = self.archetype(location.archetype).identities().get(location.row)?;
        (*stored == identity).then_some(location)
    }

    fn set_location(&mut self, identity: Identity, location: Location) {
        let index = identity.index().small_int::<usize>();
        if self.locations.len() <= index {
            self.locations.resize(index + 1, None);
        }
        self.locations[index] = Some(location);
    }

    fn clear_location(&mut self, identity: Identity) {
        if let Some(slot) = self.locations.get_mut(identity.index().small_int::<usize>()) {
            *slot = None;
        }
    }

    /// Stores a newly allocated identity in the root archetype.
    pub(crate) fn materialize(&mut self, identity: Identity) {
        let row = self.archetype_mut(ROOT).append(identity, Vec::new());
        self.set_location(identity, Location { archetype: ROOT, row });
        log::trace!("Spawned {identity}");
    }

    /// Returns the archetype for `signature`, creating it from the columns of `source` if absent.
    fn archetype_for(
        &mut self,
        signature: Signature,
        source: ArchetypeId,
        extra: Option<&dyn ErasedValue>,
        queries: &mut Queries,
    ) -> ArchetypeId {
        if let Some(&id) = self.by_signature.get(&signature) {
            return id;
        }

        let archetype = Archetype::derive(self.archetype(source), signature.clone(), extra);
        let id = match self.vacant.pop() {
            Some(id) => {
                self.archetypes[id] = Some(archetype);
                id
            }
            None => {
                self.archetypes.push(Some(archetype));
                self.archetypes.len() - 1
            }
        };

        for expr in signature.iter().filter(|expr| !expr.target().is_none()) {
            let referrers = self.by_target.entry(expr.target()).or_default();
            if !referrers.contains(&id) {
                referrers.push(id);
            }
        }

        log::debug!("Created archetype #{id} for {signature}");
        self.by_signature.insert(signature, id);
        queries.track_created(id, self.archetype(id));
        id
    }

    /// Moves the row of `identity` at `from` to the end of `dest`.
    fn relocate(
        &mut self,
        identity: Identity,
        from: Location,
        dest: ArchetypeId,
        insert: Option<Box<dyn ErasedValue>>,
    ) {
        let (source, target) = archetype::pair_mut(&mut self.archetypes, from.archetype, dest);
        let source = source.as_mut().expect("source archetype is live");
        let target = target.as_mut().expect("destination archetype is live");

        let moved = source.move_row(from.row, target, insert);
        let row = target.len() - 1;

        if let Some(moved) = moved {
            self.set_location(moved, from);
        }
        self.set_location(identity, Location { archetype: dest, row });
        log::trace!("Moved {identity} from archetype #{} to #{dest}", from.archetype);
    }

    /// Adds the component `expr` with `value` to a live entity.
    pub(crate) fn add(
        &mut self,
        identity: Identity,
        expr: TypeExpression,
        value: Box<dyn ErasedValue>,
        queries: &mut Queries,
    ) -> Result<()> {
        let location = self.location(identity).ok_or(Error::NotFound { identity, expr })?;
        let signature = self.archetype(location.archetype).signature();
        if signature.contains(expr) {
            return Err(Error::AlreadyPresent { identity, expr });
        }

        let signature = signature.with(expr);
        let dest = self.archetype_for(signature, location.archetype, Some(&*value), queries);
        self.relocate(identity, location, dest, Some(value));
        Ok(())
    }

    /// Removes the component `expr` from a live entity.
    pub(crate) fn remove(
        &mut self,
        identity: Identity,
        expr: TypeExpression,
        queries: &mut Queries,
    ) -> Result<()> {
        let not_found = Error::NotFound { identity, expr };
        let location = self.location(identity).ok_or_else(|| not_found.clone())?;
        let signature = self.archetype(location.archetype).signature();
        if !signature.contains(expr) {
            return Err(not_found);
        }

        let signature = signature.without(|other| other == expr);
        let dest = self.archetype_for(signature, location.archetype, None, queries);
        self.relocate(identity, location, dest, None);
        Ok(())
    }

    /// Despawns a live entity after stripping every relation targeting it.
    pub(crate) fn despawn(
        &mut self,
        identity: Identity,
        queries: &mut Queries,
        identities: &mut IdentityPool,
    ) {
        self.strip_target(identity, queries);

        // the entity may have moved if it related to itself
        if let Some(location) = self.location(identity) {
            if let Some(moved) = self.archetype_mut(location.archetype).remove(location.row) {
                self.set_location(moved, location);
            }
            self.clear_location(identity);
        }

        identities.release(identity);
        log::trace!("Despawned {identity}");
    }

    /// Moves every entity with an expression targeting `target`
    /// to the archetype without those expressions.
    fn strip_target(&mut self, target: Identity, queries: &mut Queries) {
        let referrers = match self.by_target.get(&target) {
            Some(referrers) => referrers.clone(),
            None => return,
        };

        for source in referrers {
            let stripped = match self.archetypes.get(source).and_then(Option::as_ref) {
                Some(archetype) if !archetype.is_empty() => {
                    archetype.signature().without(|expr| expr.target() == target)
                }
                _ => continue,
            };
            let dest = self.archetype_for(stripped, source, None, queries);

            log::debug!(
                "Stripping {} entities of archetype #{source} from relations to {target}",
                self.archetype(source).len()
            );
            while let Some(&identity) = self.archetype(source).identities().last() {
                let row = self.archetype(source).len() - 1;
                self.relocate(identity, Location { archetype: source, row }, dest, None);
            }
        }
    }

    /// Despawns every entity with an expression matching `pattern`.
    ///
    /// Returns the number of despawned entities.
    pub(crate) fn despawn_matching(
        &mut self,
        pattern: TypeExpression,
        queries: &mut Queries,
        identities: &mut IdentityPool,
    ) -> usize {
        let doomed: Vec<Identity> = self
            .archetypes()
            .filter(|(_, archetype)| archetype.matches(pattern))
            .flat_map(|(_, archetype)| archetype.identities().iter().copied())
            .collect();

        let mut count = 0;
        for identity in doomed {
            if identities.is_alive(identity) {
                self.despawn(identity, queries, identities);
                count += 1;
            }
        }
        count
    }

    /// Releases all empty archetypes except the root.
    ///
    /// Returns the number of released archetypes.
    pub(crate) fn gc(&mut self, queries: &mut Queries) -> usize {
        let empty: Vec<ArchetypeId> = self
            .archetypes()
            .filter(|&(id, archetype)| id != ROOT && archetype.is_empty())
            .map(|(id, _)| id)
            .collect();

        for &id in &empty {
            let archetype = self.archetypes[id].take().expect("collected from live archetypes");
            self.by_signature.swap_remove(archetype.signature());

            for expr in archetype.signature().iter() {
                if let Some(referrers) = self.by_target.get_mut(&expr.target()) {
                    referrers.retain(|&other| other != id);
                    if referrers.is_empty() {
                        self.by_target.remove(&expr.target());
                    }
                }
            }

            queries.forget_archetype(id);
            self.vacant.push(id);
        }

        log::debug!("Collected {} empty archetypes", empty.len());
        empty.len()
    }

    /// Inserts the targets of all stored expressions of type `type_key` into `targets`.
    pub(crate) fn collect_targets(&self, type_key: TypeKey, targets: &mut IndexSet<Identity>) {
        for (_, archetype) in self.archetypes().filter(|(_, archetype)| !archetype.is_empty()) {
            targets.extend(
                archetype
                    .signature()
                    .iter()
                    .filter(|expr| expr.type_key() == type_key && !expr.target().is_none())
                    .map(TypeExpression::target),
            );
        }
    }

    /// Whether `identity` has a component matching `pattern`.
    pub(crate) fn has_component(&self, identity: Identity, pattern: TypeExpression) -> bool {
        match self.location(identity) {
            Some(location) => self.archetype(location.archetype).matches(pattern),
            None => false,
        }
    }

    /// A pointer to the first component of `identity` matching `pattern`.
    ///
    /// The pointer is valid until the next structural change.
    pub(crate) fn locate<T: Component>(
        &self,
        identity: Identity,
        pattern: TypeExpression,
    ) -> Result<NonNull<T>> {
        let not_found = || Error::NotFound { identity, expr: pattern };
        let location = self.location(identity).ok_or_else(not_found)?;
        let archetype = self.archetype(location.archetype);
        let position =
            archetype.signature().positions_matching(pattern).next().ok_or_else(not_found)?;
        let base = archetype.column::<T>(position).as_mut_ptr();
        // Safety: `location.row` is within the column length.
        Ok(unsafe { NonNull::new_unchecked(base.add(location.row)) })
    }
}
