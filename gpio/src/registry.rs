//! Object registry shared by the bus interface and the display layers.
//!
//! A [Registry] does not own its objects. The caller keeps them (on the stack, in a static, ...)
//! and lends them to the registry, which hands out identity numbers and tracks which objects are
//! open. Identity numbers are single bits of a 16-bit set, so a registry holds at most
//! [REGISTRY_CAPACITY] objects and each number is a power of two; the lowest free bit is always
//! handed out first.
use crate::lcd::{LcdError, LcdResult};
use bitvec::array::BitArray;
use bitvec::order::Lsb0;
use log::{debug, warn};
use std::cell::Cell;
use std::fmt::{Debug, Display, Formatter};

/// Maximum number of live objects in a single registry.
pub const REGISTRY_CAPACITY: usize = 16;

/// Identity number of a registered object. Always a single bit in `0x0001..=0x8000`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Id(u16);

impl Id {
    /// Converts a raw identity number. Returns `None` unless exactly one bit is set.
    pub fn from_raw(raw: u16) -> Option<Id> {
        raw.is_power_of_two().then_some(Id(raw))
    }

    pub fn get(self) -> u16 {
        self.0
    }

    fn from_slot(slot: usize) -> Id {
        Id(1 << slot)
    }

    fn slot(self) -> usize {
        self.0.trailing_zeros() as usize
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:#06x}", self.get())
    }
}

impl From<Id> for u16 {
    fn from(id: Id) -> Self {
        id.get()
    }
}

/// Registration state embedded in every registrable object.
#[derive(Debug, Default)]
pub struct Registration {
    id: Cell<Option<Id>>,
    open: Cell<bool>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity number, if the object is currently registered.
    pub fn id(&self) -> Option<Id> {
        self.id.get()
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    fn forget(&self) {
        self.id.set(None);
        self.open.set(false);
    }
}

/// Objects that can be stored in a [Registry].
pub trait Registered {
    fn registration(&self) -> &Registration;
}

pub struct Registry<'a, T: Registered + ?Sized> {
    slots: [Option<&'a T>; REGISTRY_CAPACITY],
    active: BitArray<[u16; 1], Lsb0>,
}

impl<T: Registered + ?Sized> Default for Registry<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: Registered + ?Sized> Registry<'a, T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Registry {
            slots: [None; REGISTRY_CAPACITY],
            active: BitArray::new([0]),
        }
    }

    /// Registers `object` and returns its identity number.
    ///
    /// # Errors
    /// - `LcdError::AlreadyRegistered` if the object already has an identity number.
    /// - `LcdError::RegistryFull` if [REGISTRY_CAPACITY] objects are registered. The registry is
    ///   left unchanged.
    pub fn create(&mut self, object: &'a T) -> LcdResult<Id> {
        if object.registration().id().is_some() {
            return Err(LcdError::AlreadyRegistered);
        }

        let slot = self.active.first_zero().ok_or(LcdError::RegistryFull)?;
        let id = Id::from_slot(slot);

        self.active.set(slot, true);
        self.slots[slot] = Some(object);
        object.registration().id.set(Some(id));
        object.registration().open.set(false);

        debug!("Registered {} (active {:#06x})", id, self.active_mask());
        Ok(id)
    }

    /// Unregisters the object with identity number `id`, freeing the number.
    ///
    /// # Errors
    /// - `LcdError::NotFound` if no object is registered under `id`.
    /// - `LcdError::StillOpen` if the object is open.
    pub fn destroy(&mut self, id: Id) -> LcdResult<()> {
        let object = self.get(id).ok_or(LcdError::NotFound(id))?;

        if object.registration().is_open() {
            warn!("Refusing to destroy {} while it is open", id);
            return Err(LcdError::StillOpen(id));
        }

        object.registration().forget();
        self.slots[id.slot()] = None;
        self.active.set(id.slot(), false);

        debug!("Destroyed {} (active {:#06x})", id, self.active_mask());
        Ok(())
    }

    /// Opens the object with identity number `id` and returns the handle to it.
    ///
    /// # Errors
    /// - `LcdError::NotFound` if no object is registered under `id`.
    /// - `LcdError::AlreadyOpen` if the object is open already.
    pub fn open(&mut self, id: Id) -> LcdResult<&'a T> {
        let object = self.get(id).ok_or(LcdError::NotFound(id))?;

        if object.registration().is_open() {
            return Err(LcdError::AlreadyOpen(id));
        }

        object.registration().open.set(true);
        debug!("Opened {}", id);
        Ok(object)
    }

    /// Closes a handle returned by [Registry::open], returning its identity number.
    ///
    /// # Errors
    /// - `LcdError::NotOpen` if the handle is not open, or does not belong to this registry.
    pub fn close(&mut self, handle: &T) -> LcdResult<Id> {
        let id = handle.registration().id().ok_or(LcdError::NotOpen)?;

        match self.get(id) {
            Some(object) if std::ptr::eq(object, handle) && object.registration().is_open() => {
                object.registration().open.set(false);
                debug!("Closed {}", id);
                Ok(id)
            }
            _ => Err(LcdError::NotOpen),
        }
    }

    /// Gets the object registered under `id`, open or not.
    pub fn get(&self, id: Id) -> Option<&'a T> {
        self.slots[id.slot()]
    }

    pub fn contains(&self, id: Id) -> bool {
        self.active[id.slot()]
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.active.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == REGISTRY_CAPACITY
    }

    /// All identity numbers in use, OR-ed together.
    pub fn active_mask(&self) -> u16 {
        self.active
            .iter_ones()
            .fold(0, |mask, slot| mask | Id::from_slot(slot).get())
    }

    /// Iterates over the registered objects, lowest identity number first.
    pub fn iter(&self) -> impl Iterator<Item = (Id, &'a T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, object)| object.map(|object| (Id::from_slot(slot), object)))
    }

    /// Empties the registry. The objects only lose their identity numbers and open flags.
    pub fn clear(&mut self) {
        for object in self.slots.iter_mut().filter_map(Option::take) {
            object.registration().forget();
        }
        self.active = BitArray::new([0]);
        debug!("Registry cleared");
    }
}

impl<T: Registered + ?Sized> Debug for Registry<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Registry({:#06x})", self.active_mask())
    }
}
