//! Macros for ergonomic state table construction.

/// Build a [`StateTable`](crate::core::StateTable) from a compact listing.
///
/// Each entry names a state followed by [`StateDefinition`] builder calls.
/// Keys with a value pass it as the argument; bare keys such as `initial`
/// take none.
///
/// [`StateDefinition`]: crate::core::StateDefinition
///
/// # Example
///
/// ```
/// use deferred_fsm::core::StateTable;
/// use deferred_fsm::state_table;
///
/// struct Door;
///
/// let table: StateTable<Door> = state_table! {
///     "open" => { methods: ["walkThrough", "closeDoor"], transitions: ["shut"] },
///     "shut" => { methods: ["openDoor"], transitions: ["open"], trigger: "closeDoor" },
///     "destroyed" => { initial },
/// };
///
/// assert_eq!(table.names(), ["open", "shut", "destroyed"]);
/// ```
#[macro_export]
macro_rules! state_table {
    (
        $(
            $name:literal => { $( $key:ident $(: $value:expr)? ),* $(,)? }
        ),* $(,)?
    ) => {
        $crate::core::StateTable::new()
            $(
                .state(
                    $name,
                    $crate::core::StateDefinition::new() $( .$key( $($value)? ) )*,
                )
            )*
    };
}
